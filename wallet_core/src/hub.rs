//! Lossless fan-out of provider session changes.
//!
//! Every subscriber gets its own unbounded queue, so a slow reader never causes
//! another reader (or itself) to miss an event. Events carry a sequence number
//! assigned under the hub lock, which gives every subscriber the same total
//! order. Dropping a [`Subscription`] unregisters it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;

use securepool_types::WalletAddress;
use securepool_utils::lock;

/// A provider's view of the current user, normalized across backends.
///
/// This may hold the invalid combination `logged_in && address.is_none()`;
/// turning it into a valid [`Session`](crate::Session) is the store's job.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderSnapshot {
    pub logged_in: bool,
    pub address: Option<WalletAddress>,
}

impl ProviderSnapshot {
    pub fn logged_out() -> Self {
        Self::default()
    }

    pub fn logged_in(address: WalletAddress) -> Self {
        Self {
            logged_in: true,
            address: Some(address),
        }
    }

    /// Whether this snapshot satisfies the connected predicate.
    pub fn is_qualifying(&self) -> bool {
        self.logged_in && self.address.is_some()
    }
}

/// A session change emitted by a provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderEvent {
    /// Position in the hub's total order, starting at 1.
    pub seq: u64,
    pub snapshot: ProviderSnapshot,
}

struct HubInner {
    next_listener: u64,
    last_seq: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<ProviderEvent>>,
}

/// Registry of session-change listeners for one provider.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<Mutex<HubInner>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                next_listener: 0,
                last_seq: 0,
                listeners: HashMap::new(),
            })),
        }
    }

    /// Register a new listener. It sees every event emitted after this call.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = lock(&self.inner);
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.listeners.insert(id, tx);
        tracing::trace!(listener = id, "provider listener registered");
        Subscription {
            id,
            rx,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver a snapshot to every listener. Returns the event's sequence number.
    pub fn emit(&self, snapshot: ProviderSnapshot) -> u64 {
        let mut inner = lock(&self.inner);
        inner.last_seq += 1;
        let event = ProviderEvent {
            seq: inner.last_seq,
            snapshot,
        };
        inner
            .listeners
            .retain(|_, tx| tx.send(event.clone()).is_ok());
        tracing::trace!(
            seq = event.seq,
            listeners = inner.listeners.len(),
            logged_in = event.snapshot.logged_in,
            "provider event emitted"
        );
        event.seq
    }

    /// Sequence number of the most recent event (0 if none yet).
    pub fn last_seq(&self) -> u64 {
        lock(&self.inner).last_seq
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered listener. Unregisters itself on drop.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<ProviderEvent>,
    hub: Weak<Mutex<HubInner>>,
}

impl Subscription {
    /// Wait for the next event. Returns `None` once the provider is gone.
    pub async fn recv(&mut self) -> Option<ProviderEvent> {
        self.rx.recv().await
    }

    /// Take the next already-queued event, if any.
    pub fn try_recv(&mut self) -> Option<ProviderEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            lock(&hub).listeners.remove(&self.id);
            tracing::trace!(listener = self.id, "provider listener removed");
        }
    }
}
