use tracing_subscriber::EnvFilter;

/// The filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Installs the global `tracing` subscriber.
///
/// Respects `RUST_LOG` if it's set, otherwise everything at `info` and above is
/// printed. Calling this more than once is harmless; subsequent calls are ignored
/// (tests in particular tend to do this).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init();
}
