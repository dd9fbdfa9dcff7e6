use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the `tracing` filter directives.
pub const LOG_ENV: &str = "MEMOCACHE_LOG";

const DEFAULT_DIRECTIVES: &str = "warn";

/// Install a global fmt subscriber filtered by `MEMOCACHE_LOG`.
///
/// Calling this more than once (or after another subscriber was installed) is
/// harmless: the first subscriber stays in place.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
