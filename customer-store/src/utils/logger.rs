//! Logging Infrastructure
//!
//! Structured logging for console and, optionally, files:
//! - Daily rotating application logs (deleted after 14 days)
//! - Permanent migration logs (target `migration`, never deleted), so every
//!   renumbering of customer ids stays traceable

use std::fs;
use std::path::{Path, PathBuf};
use tracing::Metadata;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Days an application log file is kept
pub const LOG_RETENTION_DAYS: i64 = 14;

/// Target of the permanent migration trail
pub const MIGRATION_TARGET: &str = "migration";

const APP_LOG_PREFIX: &str = "app";
const MIGRATION_LOG_PREFIX: &str = "migration";

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Delete rotated `app.YYYY-MM-DD` files older than `keep_days`.
/// Returns how many files were removed.
pub fn cleanup_old_logs(log_dir: &Path, keep_days: i64) -> anyhow::Result<usize> {
    let app_log_dir = log_dir.join(APP_LOG_PREFIX);
    if !app_log_dir.exists() {
        return Ok(0);
    }

    let cutoff = chrono::Utc::now().date_naive() - chrono::Duration::days(keep_days);
    let mut removed = 0;
    for entry in fs::read_dir(&app_log_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(date_part) = name
            .strip_prefix(APP_LOG_PREFIX)
            .and_then(|rest| rest.strip_prefix('.'))
        else {
            continue;
        };
        if let Ok(date) = chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            && date < cutoff
        {
            fs::remove_file(&path)?;
            removed += 1;
            tracing::info!(file = %name, "Deleted old log file");
        }
    }
    Ok(removed)
}

fn file_layer<S>(
    appender: RollingFileAppender,
    json_format: bool,
    keep: fn(&Metadata<'_>) -> bool,
) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(appender));
    if json_format {
        layer
            .json()
            .with_current_span(true)
            .with_filter(filter_fn(keep))
            .boxed()
    } else {
        layer.with_filter(filter_fn(keep)).boxed()
    }
}

/// Initialize the logging system
///
/// # Arguments
/// * `level` - Log level or filter directive (`RUST_LOG` wins when set)
/// * `json_format` - JSON output (production) instead of pretty text
/// * `log_dir` - Optional directory for rotating log files
///
/// # Examples
/// ```no_run
/// # use customer_store::utils::logger::init_logger_with_file;
/// // Development setup (console only)
/// init_logger_with_file("debug", false, None)?;
///
/// // Production setup (console + file)
/// init_logger_with_file("info", true, Some("./data/logs"))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logger_with_file(
    level: &str,
    json_format: bool,
    log_dir: Option<&str>,
) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer<_>> = Vec::new();
    layers.push(if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    });

    if let Some(dir) = log_dir {
        let log_dir = Path::new(dir);
        let app_log_dir = log_dir.join(APP_LOG_PREFIX);
        let migration_log_dir = log_dir.join(MIGRATION_LOG_PREFIX);
        fs::create_dir_all(&app_log_dir)?;
        fs::create_dir_all(&migration_log_dir)?;

        let app_log = RollingFileAppender::new(Rotation::DAILY, app_log_dir, APP_LOG_PREFIX);
        layers.push(file_layer(app_log, json_format, |meta| {
            meta.target() != MIGRATION_TARGET
        }));

        let migration_log =
            RollingFileAppender::new(Rotation::DAILY, migration_log_dir, MIGRATION_LOG_PREFIX);
        layers.push(file_layer(migration_log, json_format, |meta| {
            meta.target() == MIGRATION_TARGET
        }));

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(periodic_cleanup(log_dir.to_path_buf()));
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;
    Ok(())
}

/// Console-only logger at `info`
pub fn init_logger() -> anyhow::Result<()> {
    init_logger_with_file("info", false, None)
}

/// Periodic cleanup task - runs every hour
async fn periodic_cleanup(log_dir: PathBuf) {
    use tokio::time::{Duration, sleep};

    loop {
        if let Err(e) = cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS) {
            tracing::warn!(error = %e, "Log cleanup failed");
        }
        sleep(Duration::from_secs(3600)).await;
    }
}
