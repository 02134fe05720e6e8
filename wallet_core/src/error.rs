use std::time::Duration;

use thiserror::Error;

/// Failure of a provider-level connect request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("user rejected the connection request")]
    Rejected,

    #[error("provider error: {0}")]
    Failed(String),
}

/// Failure of a provider-level disconnect request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DisconnectError {
    #[error("provider failed to revoke the session: {0}")]
    Failed(String),
}

/// Errors surfaced to callers of the session store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("wallet provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("wallet connection was rejected by the user")]
    UserRejected,

    #[error("no wallet session established within {0:?}")]
    ConnectionTimeout(Duration),

    #[error("connection attempt was superseded")]
    Superseded,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("session store has been torn down")]
    TornDown,
}

impl WalletError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            WalletError::ProviderUnavailable(_) => {
                "Wallet not found. Install or enable your wallet and try again.".to_string()
            }
            WalletError::UserRejected => {
                "Connection request was declined. Please try again.".to_string()
            }
            WalletError::ConnectionTimeout(_) => {
                "Wallet did not respond in time. Please try again.".to_string()
            }
            WalletError::Superseded => "A newer connection attempt is in progress.".to_string(),
            WalletError::Provider(_) | WalletError::TornDown => {
                "Failed to connect to wallet. Please try again.".to_string()
            }
        }
    }

    /// Whether the user can simply try again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, WalletError::TornDown)
    }
}

impl From<ConnectError> for WalletError {
    fn from(e: ConnectError) -> Self {
        match e {
            ConnectError::Unavailable(reason) => WalletError::ProviderUnavailable(reason),
            ConnectError::Rejected => WalletError::UserRejected,
            ConnectError::Failed(reason) => WalletError::Provider(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_errors_map_onto_wallet_errors() {
        assert_eq!(
            WalletError::from(ConnectError::Unavailable("no extension".into())),
            WalletError::ProviderUnavailable("no extension".into())
        );
        assert_eq!(WalletError::from(ConnectError::Rejected), WalletError::UserRejected);
        assert_eq!(
            WalletError::from(ConnectError::Failed("boom".into())),
            WalletError::Provider("boom".into())
        );
    }

    #[test]
    fn user_messages_do_not_leak_internal_reasons() {
        let err = WalletError::Provider("HTTP 502 from 10.0.0.3".into());
        assert!(!err.user_message().contains("10.0.0.3"));
        assert!(WalletError::ConnectionTimeout(Duration::from_secs(10)).is_retryable());
        assert!(!WalletError::TornDown.is_retryable());
    }
}
