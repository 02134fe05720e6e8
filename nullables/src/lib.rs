//! Nullable infrastructure for deterministic testing.
//!
//! Everything the session core talks to (clock, wallet provider, discovery
//! service, extension bridge, verification method) has a test-friendly
//! implementation here that:
//! - Returns scripted values
//! - Can be controlled programmatically
//! - Records what it was asked to do
//!
//! Timers are driven by the tokio runtime, so tests pause time with
//! `#[tokio::test(start_paused = true)]` and let it auto-advance.

pub mod authn;
pub mod clock;
pub mod extension;
pub mod provider;
pub mod verifier;

pub use authn::NullAuthn;
pub use clock::NullClock;
pub use extension::NullExtensionBridge;
pub use provider::{ConnectScript, NullProvider};
pub use verifier::NullVerifier;
