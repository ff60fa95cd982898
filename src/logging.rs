use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise everything logs at INFO, or at
/// DEBUG when `debug` is set.
pub fn init_tracing(debug: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(debug))
        .with_target(false)
        .try_init();
}

fn env_filter(debug: bool) -> EnvFilter {
    let default = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy()
}
