//! Bounded-time connect attempts.
//!
//! `Idle → Connecting → {Connected, TimedOut, Failed}`.
//!
//! An attempt clears any stale provider session, subscribes to provider events,
//! asks the provider to connect, then races the first qualifying event against
//! a deadline. Only one attempt is live at a time: starting a new one cancels
//! the previous attempt, which resolves with [`WalletError::Superseded`]. The
//! attempt's listener and timer are scoped to the attempt future, so every exit
//! path (success, timeout, provider failure, supersession, or the caller
//! dropping the future) releases them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;

use securepool_types::{Clock, Timestamp, WalletAddress};
use securepool_utils::lock;

use crate::confirmation::ConfirmationNotice;
use crate::error::WalletError;
use crate::hub::ProviderEvent;
use crate::provider::ProviderAdapter;

/// Connect budget used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Observable state of the flow.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting { attempt: u64 },
    Connected { address: WalletAddress },
    TimedOut,
    Failed { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Pending,
    Succeeded,
    Failed(String),
}

/// Record of one `connect()` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConnectionAttempt {
    pub id: u64,
    pub started_at: Timestamp,
    pub timeout_at: Timestamp,
    pub outcome: AttemptOutcome,
}

struct LiveAttempt {
    id: u64,
    cancel: oneshot::Sender<()>,
}

pub struct ConnectionFlow {
    adapter: Arc<dyn ProviderAdapter>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    notice: Arc<ConfirmationNotice>,
    state: watch::Sender<ConnectionState>,
    live: Mutex<Option<LiveAttempt>>,
    last_attempt: Mutex<Option<ConnectionAttempt>>,
    next_id: AtomicU64,
}

impl ConnectionFlow {
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        timeout: Duration,
        clock: Arc<dyn Clock>,
        notice: Arc<ConfirmationNotice>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            adapter,
            timeout,
            clock,
            notice,
            state,
            live: Mutex::new(None),
            last_attempt: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn current(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn notice(&self) -> &Arc<ConfirmationNotice> {
        &self.notice
    }

    /// The most recently started attempt.
    pub fn last_attempt(&self) -> Option<ConnectionAttempt> {
        lock(&self.last_attempt).clone()
    }

    /// Whether an attempt is in flight.
    pub fn is_connecting(&self) -> bool {
        lock(&self.live).is_some()
    }

    /// Cancel the in-flight attempt, if any. Its caller sees
    /// [`WalletError::Superseded`] and the flow returns to `Idle`.
    pub fn cancel(&self) {
        let live = lock(&self.live).take();
        if let Some(live) = live {
            tracing::debug!(attempt = live.id, "cancelling connection attempt");
            let _ = live.cancel.send(());
            self.state.send_replace(ConnectionState::Idle);
        }
    }

    /// Run one connect attempt. Resolves with the qualifying provider event.
    pub async fn connect(&self) -> Result<ProviderEvent, WalletError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, mut cancel_rx) = oneshot::channel();

        if let Some(previous) = lock(&self.live).replace(LiveAttempt {
            id,
            cancel: cancel_tx,
        }) {
            tracing::debug!(previous = previous.id, attempt = id, "superseding connection attempt");
            let _ = previous.cancel.send(());
        }

        let started_at = self.clock.now();
        *lock(&self.last_attempt) = Some(ConnectionAttempt {
            id,
            started_at,
            timeout_at: started_at.after(self.timeout),
            outcome: AttemptOutcome::Pending,
        });
        self.state.send_replace(ConnectionState::Connecting { attempt: id });
        tracing::info!(attempt = id, backend = %self.adapter.backend(), "connecting wallet");

        let mut guard = AttemptGuard {
            flow: self,
            id,
            settled: false,
        };
        let deadline = Instant::now() + self.timeout;
        let result = self.race(&mut cancel_rx, deadline).await;
        guard.settle(&result);
        result
    }

    async fn race(
        &self,
        cancel: &mut oneshot::Receiver<()>,
        deadline: Instant,
    ) -> Result<ProviderEvent, WalletError> {
        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);

        // Clear whatever the provider still holds from an earlier session.
        tokio::select! {
            biased;
            _ = &mut *cancel => return Err(WalletError::Superseded),
            result = self.adapter.disconnect() => {
                if let Err(e) = result {
                    tracing::warn!("failed to clear stale provider session: {e}");
                }
            }
            _ = &mut expiry => return Err(WalletError::ConnectionTimeout(self.timeout)),
        }

        let mut events = self.adapter.subscribe();
        let request = self.adapter.connect();
        tokio::pin!(request);
        let mut requested = false;

        loop {
            tokio::select! {
                biased;
                _ = &mut *cancel => return Err(WalletError::Superseded),
                result = &mut request, if !requested => {
                    requested = true;
                    if let Err(e) = result {
                        return Err(e.into());
                    }
                    tracing::debug!("provider accepted connect request, awaiting session event");
                }
                event = events.recv() => match event {
                    Some(event) if event.snapshot.is_qualifying() => return Ok(event),
                    Some(event) => {
                        tracing::debug!(seq = event.seq, "ignoring non-qualifying provider event");
                    }
                    None => return Err(WalletError::Provider("provider event stream closed".into())),
                },
                _ = &mut expiry => return Err(WalletError::ConnectionTimeout(self.timeout)),
            }
        }
    }

    fn finish(&self, id: u64, result: Option<&Result<ProviderEvent, WalletError>>) {
        let owned = {
            let mut live = lock(&self.live);
            let owned = live.as_ref().is_some_and(|l| l.id == id);
            if owned {
                live.take();
            }
            owned
        };

        let outcome = match result {
            Some(Ok(_)) => AttemptOutcome::Succeeded,
            Some(Err(e)) => AttemptOutcome::Failed(e.to_string()),
            None => AttemptOutcome::Failed("abandoned".into()),
        };
        if let Some(attempt) = lock(&self.last_attempt).as_mut().filter(|a| a.id == id) {
            attempt.outcome = outcome;
        }

        // A superseded attempt no longer owns the observable state.
        let state = match result {
            Some(Err(WalletError::Superseded)) => {
                tracing::debug!(attempt = id, "connection attempt superseded");
                return;
            }
            Some(Ok(event)) => match &event.snapshot.address {
                Some(address) => {
                    tracing::info!(attempt = id, %address, "wallet connected");
                    self.notice.show();
                    ConnectionState::Connected {
                        address: address.clone(),
                    }
                }
                None => ConnectionState::Idle,
            },
            Some(Err(WalletError::ConnectionTimeout(budget))) => {
                tracing::warn!(attempt = id, ?budget, "wallet connection timed out");
                ConnectionState::TimedOut
            }
            Some(Err(e)) => {
                tracing::warn!(attempt = id, "wallet connection failed: {e}");
                ConnectionState::Failed {
                    reason: e.to_string(),
                }
            }
            None if owned => {
                tracing::debug!(attempt = id, "connection attempt abandoned by caller");
                ConnectionState::Idle
            }
            None => return,
        };
        self.state.send_replace(state);
    }
}

/// Settles an attempt exactly once, including when the caller drops the future.
struct AttemptGuard<'a> {
    flow: &'a ConnectionFlow,
    id: u64,
    settled: bool,
}

impl AttemptGuard<'_> {
    fn settle(&mut self, result: &Result<ProviderEvent, WalletError>) {
        self.settled = true;
        self.flow.finish(self.id, Some(result));
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.flow.finish(self.id, None);
        }
    }
}
