// Logging/tracing setup

use s3logs2parquet_config::{LogConfig, LogFormat};

/// Initialize tracing from the log configuration.
///
/// `verbose` forces the `debug` level regardless of the configured one.
pub fn init_tracing(config: &LogConfig, verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if verbose { "debug" } else { config.level.as_str() };
    let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Ignore the error if a subscriber is already set (tests, embedders)
    let _ = match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}
