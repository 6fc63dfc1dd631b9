//! Tracing initialization.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use extharness_config::{LogFormat, LoggingConfig};

/// Build the filter: `RUST_LOG` if set, else the configured level.
pub(crate) fn env_filter(level: &str) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

/// Initialize console output and, when a directory is configured, daily
/// rolling log files.
///
/// The returned guard flushes the file writer when dropped.
pub(crate) fn init_tracing(
    logging: &LoggingConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let filter = env_filter(&logging.level)?;

    let (file_layer, guard) = match &logging.directory {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(Path::new(dir))?);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    match logging.format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init()?,
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
    }
    Ok(guard)
}

fn file_appender(dir: &Path) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("extharness")
        .filename_suffix("log")
        .max_log_files(14)
        .build(dir)?;
    Ok(appender)
}
