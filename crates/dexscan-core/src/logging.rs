//! Tracing setup for dexscan binaries.
//!
//! The filter comes from `RUST_LOG` and defaults to `info`. Logs go to
//! stderr so report output on stdout stays machine-readable.

use std::sync::Once;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber. Later calls are ignored.
pub fn init_tracing() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true);

        tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt_layer)
            .init();

        info!("dexscan tracing initialized");
    });
}

/// Initialize tracing with JSON lines on stderr.
pub fn init_tracing_json() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt_layer)
            .init();

        info!("dexscan tracing initialized (JSON mode)");
    });
}
