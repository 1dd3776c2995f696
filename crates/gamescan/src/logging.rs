use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `directive` unless `force` is set.
pub fn init(directive: &str, force: bool) -> Result<()> {
    let filter = if force {
        EnvFilter::try_new(directive)?
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directive))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!(e))
}
