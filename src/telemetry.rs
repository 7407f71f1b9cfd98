//! Tracing/logging initialization
//!
//! Logs always go to stderr; stdout is reserved for CSV output.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Safe to call more
/// than once; later calls are no-ops.
///
/// # Arguments
///
/// * `json` - Emit one JSON object per event instead of human-readable lines
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
