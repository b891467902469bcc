//! Opt-in `tracing-subscriber` bootstrap for binaries/tests that embed
//! this crate. No metrics/tracing export backend is wired up here, only
//! the local subscriber entrypoint.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a global `tracing` subscriber that writes formatted events to
/// stdout, filtered by `RUST_LOG` (defaulting to `info`). Call once, near
/// process start; a second call will panic, same as `tracing_subscriber`'s
/// own `try_init` contract.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Like [`init`], but returns an error instead of panicking if a global
/// subscriber is already installed. Suited to test harnesses that may call
/// it more than once across a process.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
