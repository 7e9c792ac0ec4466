//! Server logging: structured events to `<data_dir>/logs/server.log`.
//!
//! Environment:
//! - `THREADLINE_LOG_FILTER`, then `RUST_LOG`, else `info,tower_http=warn,hyper=warn`
//! - `THREADLINE_LOG_FORMAT`: `json` (default) or `pretty`
//! - `THREADLINE_TRUNCATE_LOG_ON_START=1`
//! - `THREADLINE_RUN_ID` to tag this process's events

use std::fs::OpenOptions;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,tower_http=warn,hyper=warn";
const LOG_FILE: &str = "server.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSettings {
    filter: String,
    format: LogFormat,
    truncate: bool,
    run_id: String,
}

impl LogSettings {
    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let filter = var("THREADLINE_LOG_FILTER")
            .or_else(|| var("RUST_LOG"))
            .filter(|f| EnvFilter::try_new(f).is_ok())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let format = match var("THREADLINE_LOG_FORMAT") {
            Some(f) if f.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };
        let run_id = var("THREADLINE_RUN_ID").unwrap_or_else(|| {
            format!(
                "pid-{}-{}",
                std::process::id(),
                chrono::Utc::now().timestamp_millis()
            )
        });
        Self {
            filter,
            format,
            truncate: var("THREADLINE_TRUNCATE_LOG_ON_START").as_deref() == Some("1"),
            run_id,
        }
    }
}

/// Keep alive for the life of the process; dropping the guard stops the
/// background writer.
pub struct LoggingHandle {
    pub run_id: String,
    pub guard: WorkerGuard,
}

pub fn init_logging(log_dir: &Path) -> anyhow::Result<LoggingHandle> {
    let settings = LogSettings::from_lookup(|key| std::env::var(key).ok());
    std::fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(LOG_FILE);

    if settings.truncate {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&log_path)?;
    }

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, LOG_FILE));
    let registry = tracing_subscriber::registry().with(EnvFilter::try_new(&settings.filter)?);

    match settings.format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .pretty()
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .json()
                    .flatten_event(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_current_span(true),
            )
            .try_init()?,
    }

    tracing::info!(
        component = "logging",
        event = "logging.initialized",
        log_path = %log_path.display(),
        format = ?settings.format,
        filter = %settings.filter,
        run_id = %settings.run_id,
        "Logging initialized"
    );

    Ok(LoggingHandle {
        run_id: settings.run_id,
        guard,
    })
}
