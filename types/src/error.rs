use thiserror::Error;

use crate::amount::TokenAmount;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("address must not be empty")]
    EmptyAddress,

    #[error("address contains whitespace: {0:?}")]
    MalformedAddress(String),

    #[error("invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: &'static str },
}

/// Why a pending financial action was refused before verification started.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("amount {amount} is below the minimum of {min}")]
    BelowMinimum { amount: TokenAmount, min: TokenAmount },

    #[error("amount {amount} exceeds the maximum of {max}")]
    AboveMaximum { amount: TokenAmount, max: TokenAmount },

    #[error("duration of {days} days is shorter than the minimum of {min_days} days")]
    DurationTooShort { days: u32, min_days: u32 },

    #[error("unknown target: {0}")]
    UnknownTarget(String),
}
