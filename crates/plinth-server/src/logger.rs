//! Logging setup for embedders.
//!
//! The library itself only emits `tracing` events; this module wires up a
//! subscriber for hosts that don't bring their own.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// Level resolution order: `verbose` forces debug for plinth crates, `quiet`
/// restricts to errors, otherwise `RUST_LOG` applies with an info-level
/// fallback. Call once at startup; calling again panics (the subscriber is
/// global).
pub fn init_logger(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("plinth_server=debug,plinth_router=debug,plinth_vfs=debug")
    } else if quiet {
        EnvFilter::new("plinth_server=error")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("plinth_server=info,plinth_router=info"))
    };

    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
