//! Shared utilities for the SecurePool client.

pub mod logging;
pub mod sync;

pub use logging::{init_logging, LogFormat};
pub use sync::lock;
