//! Modular verification method trait.
//!
//! The gate only requires *that* an identity check passes before an action
//! runs, not *how*. Methods can be swapped without touching the gate's state
//! machine.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use securepool_types::{ActionKind, Timestamp, WalletAddress};
use securepool_wallet_core::Session;

use crate::error::VerificationError;

/// What a method is asked to verify.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationRequest {
    pub attempt: u64,
    pub kind: ActionKind,
    pub requested_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Denied(String),
}

/// A pluggable identity verification method.
///
/// Implementations might include:
/// - Proof-of-personhood attestations
/// - Credential or KYC provider lookups
/// - On-chain allow lists
#[async_trait]
pub trait VerificationMethod: Send + Sync {
    /// Human-readable name of this method.
    fn name(&self) -> &str;

    /// Decide whether the action may proceed. An `Err` is treated as a denial.
    async fn verify(&self, request: &VerificationRequest) -> Result<Verdict, VerificationError>;
}

/// Approves every request after a fixed delay.
///
/// Stand-in for a real identity check; production deployments wrap or replace it.
#[derive(Clone, Copy, Debug)]
pub struct TimedApproval {
    delay: Duration,
}

impl TimedApproval {
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for TimedApproval {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

#[async_trait]
impl VerificationMethod for TimedApproval {
    fn name(&self) -> &str {
        "timed-approval"
    }

    async fn verify(&self, _request: &VerificationRequest) -> Result<Verdict, VerificationError> {
        tokio::time::sleep(self.delay).await;
        Ok(Verdict::Approved)
    }
}

/// Denies unless a wallet is connected, then defers to the wrapped method.
pub struct RequireSession<M> {
    session: watch::Receiver<Session>,
    inner: M,
}

impl<M: VerificationMethod> RequireSession<M> {
    pub fn new(session: watch::Receiver<Session>, inner: M) -> Self {
        Self { session, inner }
    }

    fn connected_address(&self) -> Option<WalletAddress> {
        self.session.borrow().address().cloned()
    }
}

#[async_trait]
impl<M: VerificationMethod> VerificationMethod for RequireSession<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn verify(&self, request: &VerificationRequest) -> Result<Verdict, VerificationError> {
        let Some(address) = self.connected_address() else {
            return Ok(Verdict::Denied("no connected wallet".into()));
        };
        let verdict = self.inner.verify(request).await?;
        // The wallet may have gone away while the inner check ran.
        match (verdict, self.connected_address()) {
            (Verdict::Approved, Some(now)) if now == address => Ok(Verdict::Approved),
            (Verdict::Approved, _) => Ok(Verdict::Denied(
                "wallet changed during verification".into(),
            )),
            (denied, _) => Ok(denied),
        }
    }
}
