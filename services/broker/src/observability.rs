//! Tracing setup for the broker service.
//!
//! Configures a tracing subscriber with environment filtering and a fmt
//! layer. Initialization is best-effort so repeated calls (as happens across
//! tests sharing one process) are harmless.
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init_observability(service_name: &str) {
    // Use environment variable for log filtering; default to "info" if unset or invalid.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer();
    let registry = tracing_subscriber::registry().with(filter).with(fmt_layer);
    if registry.try_init().is_ok() {
        tracing::debug!(service = service_name, "tracing initialized");
    }
}
