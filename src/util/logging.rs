use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize the logging system with tracing.
///
/// The `verbose` flag controls whether debug logs are shown.
/// Honors `RUST_LOG` when set in the environment.
pub fn init_logging(verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "beatline=debug,warn"
    } else {
        "beatline=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();

    Ok(())
}
