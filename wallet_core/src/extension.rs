//! Browser-extension style wallet backend.
//!
//! The extension reports a plain connected flag; the account address is looked
//! up out of band. A connected flag whose lookup yields nothing becomes a
//! logged-in snapshot without an address, which the session store heals.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use securepool_types::WalletAddress;
use securepool_utils::lock;

use crate::error::{ConnectError, DisconnectError};
use crate::hub::{EventHub, ProviderSnapshot, Subscription};
use crate::provider::{BackendKind, ProviderAdapter};

/// Host-side bridge to an installed wallet extension.
#[async_trait]
pub trait ExtensionBridge: Send + Sync {
    /// Whether the extension is present at all.
    fn is_installed(&self) -> bool;

    /// Show the connect prompt. `Ok(false)` means the user declined.
    async fn request_connect(&self) -> Result<bool, String>;

    /// Whether the extension currently considers the app connected.
    async fn is_connected(&self) -> bool;

    /// The connected account, if the extension will reveal it.
    async fn principal(&self) -> Option<String>;

    async fn disconnect(&self) -> Result<(), String>;
}

/// Bridge for hosts with no wallet extension.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoExtension;

#[async_trait]
impl ExtensionBridge for NoExtension {
    fn is_installed(&self) -> bool {
        false
    }

    async fn request_connect(&self) -> Result<bool, String> {
        Err("no wallet extension on this host".into())
    }

    async fn is_connected(&self) -> bool {
        false
    }

    async fn principal(&self) -> Option<String> {
        None
    }

    async fn disconnect(&self) -> Result<(), String> {
        Ok(())
    }
}

pub struct ExtensionAdapter {
    bridge: Arc<dyn ExtensionBridge>,
    last: Mutex<ProviderSnapshot>,
    hub: EventHub,
}

impl ExtensionAdapter {
    pub fn new(bridge: Arc<dyn ExtensionBridge>) -> Self {
        Self {
            bridge,
            last: Mutex::new(ProviderSnapshot::logged_out()),
            hub: EventHub::new(),
        }
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    async fn read_bridge(&self) -> ProviderSnapshot {
        if !self.bridge.is_connected().await {
            return ProviderSnapshot::logged_out();
        }
        let address = self
            .bridge
            .principal()
            .await
            .and_then(|p| WalletAddress::parse(p).ok());
        ProviderSnapshot {
            logged_in: true,
            address,
        }
    }

    fn store(&self, snapshot: ProviderSnapshot, always_emit: bool) {
        let changed = {
            let mut last = lock(&self.last);
            let changed = *last != snapshot;
            *last = snapshot.clone();
            changed
        };
        if changed || always_emit {
            self.hub.emit(snapshot);
        }
    }

    /// Re-read the extension and emit if the user switched account, locked the
    /// wallet, or disconnected from the extension's own UI.
    pub async fn refresh(&self) {
        let snapshot = self.read_bridge().await;
        self.store(snapshot, false);
    }
}

#[async_trait]
impl ProviderAdapter for ExtensionAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::Extension
    }

    async fn connect(&self) -> Result<(), ConnectError> {
        if !self.bridge.is_installed() {
            return Err(ConnectError::Unavailable(
                "wallet extension is not installed".into(),
            ));
        }
        match self.bridge.request_connect().await {
            Ok(true) => {}
            Ok(false) => return Err(ConnectError::Rejected),
            Err(e) => return Err(ConnectError::Failed(e)),
        }
        let snapshot = self.read_bridge().await;
        tracing::debug!(
            logged_in = snapshot.logged_in,
            has_address = snapshot.address.is_some(),
            "extension connect finished"
        );
        self.store(snapshot, true);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DisconnectError> {
        let active = lock(&self.last).logged_in;
        if !active {
            return Ok(());
        }
        let result = self
            .bridge
            .disconnect()
            .await
            .map_err(DisconnectError::Failed);
        self.store(ProviderSnapshot::logged_out(), false);
        result
    }

    fn current_session(&self) -> ProviderSnapshot {
        lock(&self.last).clone()
    }

    fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    fn last_seq(&self) -> u64 {
        self.hub.last_seq()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_extension_is_unavailable() {
        let adapter = ExtensionAdapter::new(Arc::new(NoExtension));
        assert!(matches!(
            adapter.connect().await,
            Err(ConnectError::Unavailable(_))
        ));
        assert_eq!(adapter.current_session(), ProviderSnapshot::logged_out());
    }

    #[tokio::test]
    async fn disconnect_without_session_is_noop() {
        let adapter = ExtensionAdapter::new(Arc::new(NoExtension));
        let mut events = adapter.subscribe();
        assert_eq!(adapter.disconnect().await, Ok(()));
        assert!(events.try_recv().is_none());
    }
}
