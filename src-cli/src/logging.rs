//! Subscriber setup: a daily-rotated file under the data directory plus
//! stderr.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter directive variable, e.g. `WEBPASS_LOG=webpass_vault=debug`.
pub const LOG_ENV: &str = "WEBPASS_LOG";

const LOG_PREFIX: &str = "webpass";
const LOG_SUFFIX: &str = "log";
const MAX_LOG_FILES: usize = 7;

/// Install the global subscriber. Keep the returned guard alive until exit
/// or buffered file output is lost.
pub fn init(data_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
    webpass_vault::store::create_private_dir(data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(data_dir)
        .context("Failed to open log file")?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::WARN
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(
            fmt::layer()
                .compact()
                .without_time()
                .with_writer(std::io::stderr)
                .with_filter(stderr_level),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}
