//! Logging initialisation for a harness run

use nnparity_common::{ConfigError, HarnessError};
use nnparity_config::SetupConfig;
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Name of the log file written into the run root.
pub const LOG_FILE: &str = "nnparity.log";

/// Initialise the global subscriber from the `[setup]` section.
///
/// `RUST_LOG` takes precedence over the configured level. A file layer is
/// added when the run root already exists. Calling this twice is harmless:
/// the first subscriber stays installed.
pub fn init_logging(setup: &SetupConfig) -> Result<(), HarnessError> {
    let level = parse_log_level(&setup.log_level)?;
    let filter = || EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(filter());

    let file_layer = if setup.run_root.is_dir() {
        let log_file = setup.run_root.join(LOG_FILE);
        let file = File::create(&log_file).map_err(|e| HarnessError::io(&log_file, e))?;
        Some(
            fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(filter()),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry().with(console_layer).with(file_layer).try_init();
    match installed {
        Ok(()) => tracing::info!("logging initialised with level {}", setup.log_level),
        Err(_) => tracing::debug!("a global subscriber is already installed"),
    }
    Ok(())
}

/// Parse a configured level name.
pub fn parse_log_level(level: &str) -> Result<LevelFilter, ConfigError> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        "off" => Ok(LevelFilter::OFF),
        _ => Err(ConfigError::invalid(format!("invalid log level: {level}"))),
    }
}
