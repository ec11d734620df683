//! Logging setup
//!
//! Logs go to stderr so stdout carries only progress lines and the summary.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "batchrun=warn";
const LOG_FILE_PREFIX: &str = "batchrun.log";

/// Initialize the global tracing subscriber
///
/// # Environment Variables
///
/// - `BATCHRUN_LOG`: filter directives (default: `batchrun=warn`)
/// - `BATCHRUN_LOG_FORMAT`: `json`, `pretty`, or compact (default)
/// - `BATCHRUN_LOG_DIR`: also write a daily-rolling log file there
///
/// The returned guard flushes the file writer on drop; hold it until exit.
pub fn init_logging() -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_env("BATCHRUN_LOG")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let log_format = std::env::var("BATCHRUN_LOG_FORMAT").unwrap_or_default();

    let mut guard = None;
    let file_layer = std::env::var("BATCHRUN_LOG_DIR").ok().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);
        fmt::layer().with_ansi(false).with_writer(writer)
    });

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    match log_format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        "pretty" => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }

    guard
}
