//! Value-moving actions a user can submit once verified.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::amount::TokenAmount;
use crate::error::ActionError;

/// Which financial action a verification gate is guarding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Purchasing coverage under an insurance policy.
    Insurance,
    /// Staking capital into an insurance pool.
    Staking,
}

impl ActionKind {
    /// Phrase used in user-facing prompts ("verify your identity for ...").
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Insurance => "insurance purchase",
            ActionKind::Staking => "staking",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Insurance => f.write_str("insurance"),
            ActionKind::Staking => f.write_str("staking"),
        }
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "insurance" | "coverage" => Ok(ActionKind::Insurance),
            "staking" | "stake" => Ok(ActionKind::Staking),
            other => Err(format!("unknown action kind: {other}")),
        }
    }
}

/// Limits a pool or policy places on an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBounds {
    pub min_amount: TokenAmount,
    pub max_amount: TokenAmount,
    pub min_duration_days: u32,
}

impl ActionBounds {
    /// Check an amount/duration pair against these bounds.
    pub fn check(&self, amount: TokenAmount, duration_days: u32) -> Result<(), ActionError> {
        if amount.is_zero() {
            return Err(ActionError::ZeroAmount);
        }
        if amount < self.min_amount {
            return Err(ActionError::BelowMinimum {
                amount,
                min: self.min_amount,
            });
        }
        if amount > self.max_amount {
            return Err(ActionError::AboveMaximum {
                amount,
                max: self.max_amount,
            });
        }
        if duration_days < self.min_duration_days {
            return Err(ActionError::DurationTooShort {
                days: duration_days,
                min_days: self.min_duration_days,
            });
        }
        Ok(())
    }
}

/// Capital a provider wants to lock into a pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRequest {
    pub pool_id: String,
    pub amount: TokenAmount,
    pub duration_days: u32,
}

/// Coverage a buyer wants to purchase under a policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRequest {
    pub policy_id: String,
    pub amount: TokenAmount,
    pub duration_days: u32,
}

/// An action built from form input, awaiting verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingFinancialAction {
    Stake(StakeRequest),
    Coverage(CoverageRequest),
}

impl PendingFinancialAction {
    /// The gate tag for this action.
    pub fn kind(&self) -> ActionKind {
        match self {
            PendingFinancialAction::Stake(_) => ActionKind::Staking,
            PendingFinancialAction::Coverage(_) => ActionKind::Insurance,
        }
    }

    pub fn amount(&self) -> TokenAmount {
        match self {
            PendingFinancialAction::Stake(r) => r.amount,
            PendingFinancialAction::Coverage(r) => r.amount,
        }
    }

    pub fn duration_days(&self) -> u32 {
        match self {
            PendingFinancialAction::Stake(r) => r.duration_days,
            PendingFinancialAction::Coverage(r) => r.duration_days,
        }
    }

    /// Pool or policy the action targets.
    pub fn target_id(&self) -> &str {
        match self {
            PendingFinancialAction::Stake(r) => &r.pool_id,
            PendingFinancialAction::Coverage(r) => &r.policy_id,
        }
    }

    /// Validate against the target's bounds.
    pub fn validate(&self, bounds: &ActionBounds) -> Result<(), ActionError> {
        bounds.check(self.amount(), self.duration_days())
    }
}

impl fmt::Display for PendingFinancialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingFinancialAction::Stake(r) => write!(
                f,
                "stake {} for {} days in pool {}",
                r.amount, r.duration_days, r.pool_id
            ),
            PendingFinancialAction::Coverage(r) => write!(
                f,
                "cover {} for {} days under policy {}",
                r.amount, r.duration_days, r.policy_id
            ),
        }
    }
}
