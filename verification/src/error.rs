use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("verification service unavailable: {0}")]
    Unavailable(String),

    #[error("verification check failed: {0}")]
    Check(String),
}
