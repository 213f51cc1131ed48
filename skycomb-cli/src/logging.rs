//! `tracing-subscriber` setup, in the shape of the teacher's
//! `env-tracing-logger`: an uptime-timed, compact `fmt` layer gated by
//! `RUST_LOG` (or `SKYCOMB_LOG`), installed once as the global default.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. Panics if a subscriber is already
/// installed (only ever called once, from `main`).
pub fn init() {
    let filter = EnvFilter::try_from_env("SKYCOMB_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_timer(fmt::time::Uptime::default())
        .compact();

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();
}
