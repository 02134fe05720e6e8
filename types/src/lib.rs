//! Fundamental types for the SecurePool client core.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! wallet addresses, timestamps and clocks, token amounts, the financial actions a
//! user can submit, and the pool/policy catalog those actions are validated against.

pub mod action;
pub mod address;
pub mod amount;
pub mod catalog;
pub mod error;
pub mod time;

pub use action::{
    ActionBounds, ActionKind, CoverageRequest, PendingFinancialAction, StakeRequest,
};
pub use address::WalletAddress;
pub use amount::TokenAmount;
pub use catalog::{Catalog, InsurancePolicy, InsurancePool};
pub use error::{ActionError, TypesError};
pub use time::{Clock, SystemClock, Timestamp};
