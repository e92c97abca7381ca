use tracing_subscriber::EnvFilter;

use taskloom_core::config::LogConfig;

/// Install a `fmt` subscriber. `RUST_LOG` wins over the configured filter.
///
/// Returns `false` if a global subscriber was already set.
pub fn init(config: &LogConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter)),
        )
        .with_target(false)
        .try_init()
        .is_ok()
}
