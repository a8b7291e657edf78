//! `tracing` subscriber bootstrap for binaries embedding the engine.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the application. These helpers install the usual
//! registry + `EnvFilter` + fmt stack, honouring `RUST_LOG` and falling back
//! to `info`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Installs the global subscriber.
///
/// # Panics
///
/// Panics if a global subscriber is already set. Use [`try_init_logging`]
/// where that may happen, e.g. in tests.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Installs the global subscriber, returning an error if one is already set.
pub fn try_init_logging() -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
