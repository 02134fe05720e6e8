//! Action verification for value-moving operations.
//!
//! Every stake or coverage purchase passes through an [`ActionVerificationGate`]
//! before it runs. The gate owns the two-phase flow (verifying, then success or
//! failure); *how* identity is checked is a pluggable [`VerificationMethod`].

pub mod error;
pub mod gate;
pub mod method;
pub mod state;

pub use error::VerificationError;
pub use gate::{ActionVerificationGate, GateTicket, DEFAULT_SUCCESS_HOLD};
pub use method::{
    RequireSession, TimedApproval, Verdict, VerificationMethod, VerificationRequest,
};
pub use state::{GateOutcome, GateStage, VerificationAttempt};
