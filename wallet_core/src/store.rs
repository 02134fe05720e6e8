//! The process-wide session store.
//!
//! Holds the [`Session`] and is its only writer. The session is derived from
//! provider events: on init the store takes a cold snapshot and subscribes for
//! live updates; every event is reconciled (self-healing a logged-in state
//! without an address by forcing a provider disconnect) and published to
//! readers through a `watch` channel. `teardown` releases the subscription.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use securepool_types::{Clock, WalletAddress};
use securepool_utils::lock;

use crate::confirmation::{ConfirmationNotice, ConfirmationTimings};
use crate::connection::{ConnectionFlow, DEFAULT_CONNECT_TIMEOUT};
use crate::error::WalletError;
use crate::hub::ProviderEvent;
use crate::provider::{BackendKind, ProviderAdapter};
use crate::session::{reconcile, Session};

/// Tunables for the store and the connection flow it owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub connect_timeout: Duration,
    pub confirmation: ConfirmationTimings,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            confirmation: ConfirmationTimings::default(),
        }
    }
}

struct StoreInner {
    adapter: Arc<dyn ProviderAdapter>,
    session: watch::Sender<Session>,
    applied_seq: Mutex<u64>,
}

impl StoreInner {
    /// Apply a provider event unless a newer one, or a local disconnect that
    /// came after it, has already been applied.
    async fn apply(&self, event: &ProviderEvent) {
        let force_disconnect = {
            let mut applied = lock(&self.applied_seq);
            if event.seq <= *applied {
                tracing::trace!(seq = event.seq, applied = *applied, "skipping stale provider event");
                return;
            }
            *applied = event.seq;
            let reconciled = reconcile(&event.snapshot);
            self.publish(reconciled.session);
            reconciled.force_disconnect
        };
        if force_disconnect {
            self.heal().await;
        }
    }

    /// Publish `Disconnected` and retire every event up to `barrier`.
    fn clear(&self, barrier: u64) {
        let mut applied = lock(&self.applied_seq);
        *applied = (*applied).max(barrier);
        self.publish(Session::Disconnected);
    }

    fn publish(&self, session: Session) {
        self.session.send_if_modified(|current| {
            if *current == session {
                return false;
            }
            tracing::debug!(
                connected = session.is_connected(),
                address = ?session.address().map(WalletAddress::as_str),
                "session changed"
            );
            *current = session;
            true
        });
    }

    async fn heal(&self) {
        tracing::warn!("provider reported a login without an address, forcing disconnect");
        if let Err(e) = self.adapter.disconnect().await {
            tracing::warn!("forced disconnect failed: {e}");
        }
    }
}

pub struct SessionStore {
    adapter: Arc<dyn ProviderAdapter>,
    flow: ConnectionFlow,
    inner: Arc<StoreInner>,
    listener: Mutex<Option<JoinHandle<()>>>,
    torn_down: AtomicBool,
}

impl SessionStore {
    /// Reconcile with the provider and start listening. Must be called within a
    /// tokio runtime.
    pub fn init(adapter: Arc<dyn ProviderAdapter>, config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        // Subscribe before the snapshot so no change slips in between.
        let mut events = adapter.subscribe();
        let cold = adapter.current_session();
        let reconciled = reconcile(&cold);

        let (session, _) = watch::channel(reconciled.session);
        let inner = Arc::new(StoreInner {
            adapter: Arc::clone(&adapter),
            session,
            applied_seq: Mutex::new(0),
        });

        let listener = {
            let inner = Arc::clone(&inner);
            let heal_first = reconciled.force_disconnect;
            tokio::spawn(async move {
                if heal_first {
                    inner.heal().await;
                }
                while let Some(event) = events.recv().await {
                    inner.apply(&event).await;
                }
                tracing::debug!("provider event stream ended");
            })
        };

        let notice = Arc::new(ConfirmationNotice::new(config.confirmation));
        let flow = ConnectionFlow::new(Arc::clone(&adapter), config.connect_timeout, clock, notice);

        tracing::info!(backend = %adapter.backend(), "session store initialised");
        Self {
            adapter,
            flow,
            inner,
            listener: Mutex::new(Some(listener)),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.adapter.backend()
    }

    /// Current session.
    pub fn session(&self) -> Session {
        self.inner.session.borrow().clone()
    }

    /// Subscribe to session changes.
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.inner.session.subscribe()
    }

    pub fn flow(&self) -> &ConnectionFlow {
        &self.flow
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Connect the wallet. On failure the session is left untouched.
    pub async fn connect(&self) -> Result<WalletAddress, WalletError> {
        if self.is_torn_down() {
            return Err(WalletError::TornDown);
        }
        let event = self.flow.connect().await?;
        self.inner.apply(&event).await;
        event
            .snapshot
            .address
            .ok_or_else(|| WalletError::Provider("qualifying event without address".into()))
    }

    /// Disconnect the wallet. The local session is cleared even if the
    /// provider call fails.
    pub async fn disconnect(&self) {
        self.flow.cancel();
        if let Err(e) = self.adapter.disconnect().await {
            tracing::warn!("provider disconnect failed, clearing local session anyway: {e}");
        }
        // Events already queued for the listener predate this disconnect.
        self.inner.clear(self.adapter.last_seq());
        tracing::info!("wallet disconnected");
    }

    /// Stop listening and reset the session. Idempotent.
    pub async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.flow.cancel();
        self.flow.notice().dismiss();
        let listener = lock(&self.listener).take();
        if let Some(task) = listener {
            task.abort();
            let _ = task.await;
        }
        self.inner.clear(self.adapter.last_seq());
        tracing::info!("session store torn down");
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.listener).take() {
            task.abort();
        }
    }
}
