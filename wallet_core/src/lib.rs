//! Wallet session core for the SecurePool client.
//!
//! Reconciles the client's belief about the connected wallet with an external,
//! asynchronous wallet provider it does not control:
//! - [`ProviderAdapter`]: one capability interface over every wallet backend
//!   (a discovery/redirect service and a browser-extension bridge ship here)
//! - [`EventHub`]: lossless fan-out of provider session changes
//! - [`SessionStore`]: the single writer of the [`Session`], self-healing
//!   invalid provider states
//! - [`ConnectionFlow`]: a bounded-time, supersedable connect attempt
//! - [`ConfirmationNotice`]: the one-shot "connected" notice shown after success

pub mod confirmation;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod extension;
pub mod hub;
pub mod provider;
pub mod session;
pub mod store;

pub use confirmation::{ConfirmationNotice, ConfirmationStage, ConfirmationTimings};
pub use connection::{AttemptOutcome, ConnectionAttempt, ConnectionFlow, ConnectionState};
pub use discovery::{
    AuthnService, AuthorizeHook, CurrentUser, DiscoveryAdapter, DiscoveryConfig, HttpAuthn,
};
pub use error::{ConnectError, DisconnectError, WalletError};
pub use extension::{ExtensionAdapter, ExtensionBridge, NoExtension};
pub use hub::{EventHub, ProviderEvent, ProviderSnapshot, Subscription};
pub use provider::{BackendKind, ProviderAdapter};
pub use session::{reconcile, Reconciliation, Session};
pub use store::{SessionStore, StoreConfig};
