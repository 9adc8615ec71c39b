//! Tracing bootstrap for host front-ends.
//!
//! The library itself only emits `tracing` events (tagged with the
//! originating stage); hosts that do not install their own subscriber can
//! call [`init`] once at startup. `RUST_LOG` overrides the default filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a formatted subscriber honoring `RUST_LOG`, defaulting to
/// `info` for this crate. Calling it twice is a no-op (the second install
/// fails quietly rather than panicking mid-session).
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("civis_service=info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
