//! Nullable discovery service.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use securepool_utils::lock;
use securepool_wallet_core::{AuthnService, ConnectError, CurrentUser, DisconnectError};

#[derive(Default)]
struct AuthnState {
    responses: VecDeque<(Duration, Result<CurrentUser, ConnectError>)>,
    authenticate_calls: usize,
    unauthenticate_calls: usize,
}

/// A discovery service that answers from a script.
///
/// An unscripted `authenticate()` waits forever, like a user who never
/// completes the handshake.
#[derive(Clone, Default)]
pub struct NullAuthn {
    state: Arc<Mutex<AuthnState>>,
}

impl NullAuthn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next `authenticate()` call, delivered after `delay`.
    pub fn respond(&self, delay: Duration, result: Result<CurrentUser, ConnectError>) {
        lock(&self.state).responses.push_back((delay, result));
    }

    pub fn authenticate_calls(&self) -> usize {
        lock(&self.state).authenticate_calls
    }

    pub fn unauthenticate_calls(&self) -> usize {
        lock(&self.state).unauthenticate_calls
    }
}

#[async_trait]
impl AuthnService for NullAuthn {
    async fn authenticate(&self) -> Result<CurrentUser, ConnectError> {
        let next = {
            let mut state = lock(&self.state);
            state.authenticate_calls += 1;
            state.responses.pop_front()
        };
        match next {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => std::future::pending().await,
        }
    }

    async fn unauthenticate(&self) -> Result<(), DisconnectError> {
        lock(&self.state).unauthenticate_calls += 1;
        Ok(())
    }
}
