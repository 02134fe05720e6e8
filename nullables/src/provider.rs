//! Nullable wallet provider: scripted connect outcomes and session events.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use securepool_types::WalletAddress;
use securepool_utils::lock;
use securepool_wallet_core::{
    BackendKind, ConnectError, DisconnectError, EventHub, ProviderAdapter, ProviderSnapshot,
    Subscription,
};

/// What the next `connect()` call does.
#[derive(Clone, Debug)]
pub enum ConnectScript {
    /// Resolve `Ok`, then emit `snapshot` (if any) after `after` has elapsed.
    Approve {
        emit: Option<ProviderSnapshot>,
        after: Duration,
    },
    /// Resolve with this error and emit nothing.
    Fail(ConnectError),
    /// Never resolve.
    Hang,
}

impl ConnectScript {
    /// Approve and emit a valid login for `address` after `after`.
    ///
    /// Panics if `address` is not a valid wallet address.
    pub fn login(address: &str, after: Duration) -> Self {
        let address = WalletAddress::parse(address).expect("test address must be valid");
        ConnectScript::Approve {
            emit: Some(ProviderSnapshot::logged_in(address)),
            after,
        }
    }

    /// Approve but never emit a session event.
    pub fn silent() -> Self {
        ConnectScript::Approve {
            emit: None,
            after: Duration::ZERO,
        }
    }
}

#[derive(Default)]
struct NullState {
    current: ProviderSnapshot,
    script: VecDeque<ConnectScript>,
    connect_calls: usize,
    disconnect_calls: usize,
    disconnect_error: Option<String>,
}

/// A provider that does exactly what the test scripts.
///
/// Unscripted `connect()` calls behave like [`ConnectScript::silent`].
#[derive(Clone)]
pub struct NullProvider {
    backend: BackendKind,
    state: Arc<Mutex<NullState>>,
    hub: EventHub,
}

impl NullProvider {
    pub fn new() -> Self {
        Self {
            backend: BackendKind::Discovery,
            state: Arc::new(Mutex::new(NullState::default())),
            hub: EventHub::new(),
        }
    }

    /// Report a different backend kind.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Start with an existing provider-side session.
    pub fn with_session(self, snapshot: ProviderSnapshot) -> Self {
        lock(&self.state).current = snapshot;
        self
    }

    /// Queue the behaviour of a future `connect()` call.
    pub fn script_connect(&self, script: ConnectScript) {
        lock(&self.state).script.push_back(script);
    }

    /// Make every following `disconnect()` fail.
    pub fn fail_disconnects(&self, reason: impl Into<String>) {
        lock(&self.state).disconnect_error = Some(reason.into());
    }

    /// Simulate a provider-side session change.
    pub fn emit(&self, snapshot: ProviderSnapshot) -> u64 {
        emit_from(&self.state, &self.hub, snapshot)
    }

    pub fn connect_calls(&self) -> usize {
        lock(&self.state).connect_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        lock(&self.state).disconnect_calls
    }

    pub fn listener_count(&self) -> usize {
        self.hub.listener_count()
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }
}

impl Default for NullProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn emit_from(state: &Mutex<NullState>, hub: &EventHub, snapshot: ProviderSnapshot) -> u64 {
    lock(state).current = snapshot.clone();
    hub.emit(snapshot)
}

#[async_trait]
impl ProviderAdapter for NullProvider {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    async fn connect(&self) -> Result<(), ConnectError> {
        let script = {
            let mut state = lock(&self.state);
            state.connect_calls += 1;
            state.script.pop_front().unwrap_or_else(ConnectScript::silent)
        };
        match script {
            ConnectScript::Approve { emit, after } => {
                if let Some(snapshot) = emit {
                    let state = Arc::clone(&self.state);
                    let hub = self.hub.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        emit_from(&state, &hub, snapshot);
                    });
                }
                Ok(())
            }
            ConnectScript::Fail(e) => Err(e),
            ConnectScript::Hang => std::future::pending().await,
        }
    }

    async fn disconnect(&self) -> Result<(), DisconnectError> {
        let active = {
            let mut state = lock(&self.state);
            state.disconnect_calls += 1;
            if let Some(reason) = &state.disconnect_error {
                return Err(DisconnectError::Failed(reason.clone()));
            }
            state.current.logged_in || state.current.address.is_some()
        };
        if active {
            self.emit(ProviderSnapshot::logged_out());
        }
        Ok(())
    }

    fn current_session(&self) -> ProviderSnapshot {
        lock(&self.state).current.clone()
    }

    fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    fn last_seq(&self) -> u64 {
        self.hub.last_seq()
    }
}
