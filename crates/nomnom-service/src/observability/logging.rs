//! Log filtering shared by the service and the management commands.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
///
/// Events use `nomnom.*` targets while spans and plain `info!` calls use the
/// `nomnom_service` module path. Directives match by target prefix, so
/// `nomnom` covers both.
pub const DEFAULT_LOG_FILTER: &str = "nomnom=info,tower_http=info";

/// `RUST_LOG` if set and valid, otherwise [`DEFAULT_LOG_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
