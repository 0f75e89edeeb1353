//! Shared helpers for the ferry binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with an env-filter; RUST_LOG overrides the default.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "ferry=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
