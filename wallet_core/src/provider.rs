//! The uniform capability interface over wallet backends.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConnectError, DisconnectError};
use crate::hub::{ProviderSnapshot, Subscription};

/// Which wallet backend an adapter wraps. Chosen once, at configuration time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Discovery/redirect service: connected means logged in *and* an address.
    #[default]
    Discovery,
    /// Browser-extension style: a connected flag plus an out-of-band address.
    Extension,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Discovery => f.write_str("discovery"),
            BackendKind::Extension => f.write_str("extension"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "discovery" => Ok(BackendKind::Discovery),
            "extension" => Ok(BackendKind::Extension),
            other => Err(format!("unknown wallet backend: {other}")),
        }
    }
}

/// One external wallet backend behind a uniform interface.
///
/// Shared logic never branches on the backend; every backend-specific rule
/// lives in the implementation and is expressed through [`ProviderSnapshot`].
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Request user authorization. A successful call may (and usually will)
    /// also emit a session event, independently of this call's own result.
    async fn connect(&self) -> Result<(), ConnectError>;

    /// Revoke the session. With no active session this is a no-op success.
    async fn disconnect(&self) -> Result<(), DisconnectError>;

    /// Best-effort synchronous snapshot, used for the initial reconciliation.
    fn current_session(&self) -> ProviderSnapshot;

    /// Register a listener for every provider-side session change.
    fn subscribe(&self) -> Subscription;

    /// Sequence number of the most recent session event (0 if none yet).
    fn last_seq(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_round_trip() {
        for kind in [BackendKind::Discovery, BackendKind::Extension] {
            assert_eq!(kind.to_string().parse::<BackendKind>(), Ok(kind));
        }
        assert_eq!("Extension".parse::<BackendKind>(), Ok(BackendKind::Extension));
        assert!("walletconnect".parse::<BackendKind>().is_err());
    }
}
