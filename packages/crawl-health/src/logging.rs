//! Tracing setup for binaries embedding the tracker.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,crawl_health=debug,sqlx=warn";

/// Install a global subscriber writing to stderr.
///
/// Stdout is left alone so command output stays machine-readable. Calling
/// this twice is a no-op.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
