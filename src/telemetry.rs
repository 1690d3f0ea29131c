//! Logging setup for the binary.
//!
//! ```rust
//! admin_console::telemetry::init(false);
//! tracing::info!(name: "console.started", "ready");
//! ```

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging.
///
/// Configures `tracing-subscriber::fmt` with an `EnvFilter` (`RUST_LOG`,
/// defaulting to `info,admin_console=debug`). With `json` set, events are
/// emitted as one JSON object per line. Logs go to stderr so command
/// output on stdout stays clean.
pub fn init(json: bool) {
    let filter_layer = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,admin_console=debug"));

    let registry = tracing_subscriber::registry().with(filter_layer);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}
