//! Tracing subscriber setup.

use crate::cli::TracingFormat;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber. `RUST_LOG` wins over the configured
/// default level when set.
pub fn setup(default_level: &str, format: TracingFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,rollcall={default_level}")));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        TracingFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
        TracingFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}
