/// Logging initialisation
///
/// `RUST_LOG` overrides the default `info` level.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::utils::LogFormat;

pub fn init_tracing(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| anyhow!("Failed to initialise logging: {}", e))
}
