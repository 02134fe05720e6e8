//! Nullable wallet-extension bridge.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use securepool_utils::lock;
use securepool_wallet_core::ExtensionBridge;

struct BridgeState {
    installed: bool,
    approve: Result<bool, String>,
    connected: bool,
    principal: Option<String>,
    prompts: usize,
}

/// An extension bridge whose answers are set by the test.
///
/// Approving a prompt marks the bridge connected and, when a principal has
/// been configured, reveals it.
#[derive(Clone)]
pub struct NullExtensionBridge {
    state: Arc<Mutex<BridgeState>>,
}

impl NullExtensionBridge {
    /// An installed extension that approves and reveals `principal`.
    pub fn approving(principal: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(BridgeState {
                installed: true,
                approve: Ok(true),
                connected: false,
                principal: Some(principal.to_string()),
                prompts: 0,
            })),
        }
    }

    /// No extension on this host.
    pub fn missing() -> Self {
        let bridge = Self::approving("");
        {
            let mut state = lock(&bridge.state);
            state.installed = false;
            state.principal = None;
        }
        bridge
    }

    pub fn set_approval(&self, approve: Result<bool, String>) {
        lock(&self.state).approve = approve;
    }

    /// Change the revealed principal without a prompt.
    pub fn set_principal(&self, principal: Option<&str>) {
        lock(&self.state).principal = principal.map(str::to_string);
    }

    pub fn set_connected(&self, connected: bool) {
        lock(&self.state).connected = connected;
    }

    pub fn prompts(&self) -> usize {
        lock(&self.state).prompts
    }
}

#[async_trait]
impl ExtensionBridge for NullExtensionBridge {
    fn is_installed(&self) -> bool {
        lock(&self.state).installed
    }

    async fn request_connect(&self) -> Result<bool, String> {
        let mut state = lock(&self.state);
        state.prompts += 1;
        let approved = state.approve.clone()?;
        if approved {
            state.connected = true;
        }
        Ok(approved)
    }

    async fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    async fn principal(&self) -> Option<String> {
        let state = lock(&self.state);
        if state.connected {
            state.principal.clone()
        } else {
            None
        }
    }

    async fn disconnect(&self) -> Result<(), String> {
        lock(&self.state).connected = false;
        Ok(())
    }
}
