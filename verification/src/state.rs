//! Gate state tracking.

use serde::Serialize;

use securepool_types::{ActionKind, Timestamp};

/// One opening of the gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationAttempt {
    pub id: u64,
    pub kind: ActionKind,
    pub started_at: Timestamp,
}

/// What a presentation layer renders for the gate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum GateStage {
    #[default]
    Closed,
    /// Identity check in progress.
    Verifying { attempt: VerificationAttempt },
    /// Check passed; the caller's action has been released.
    Success { attempt: VerificationAttempt },
    /// Check failed. Terminal for this attempt; waits for an explicit close.
    Failed {
        attempt: VerificationAttempt,
        reason: String,
    },
}

impl GateStage {
    pub fn is_open(&self) -> bool {
        !matches!(self, GateStage::Closed)
    }

    pub fn attempt(&self) -> Option<&VerificationAttempt> {
        match self {
            GateStage::Closed => None,
            GateStage::Verifying { attempt }
            | GateStage::Success { attempt }
            | GateStage::Failed { attempt, .. } => Some(attempt),
        }
    }
}

/// How one opening of the gate ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum GateOutcome {
    /// Verified; the action callback ran.
    Proceeded,
    /// Verification failed; the action did not run.
    Failed(String),
    /// Closed before verification finished; the action did not run.
    Cancelled,
    /// A newer opening replaced this one before verification finished.
    Superseded,
}

impl GateOutcome {
    pub fn proceeded(&self) -> bool {
        matches!(self, GateOutcome::Proceeded)
    }
}
