//! Logging setup
//!
//! Console output by default; daily rolling files when a log directory is
//! configured.

use std::path::Path;

/// Initialize the logger with console output
pub fn init_logger() {
    init_logger_with_file(None, None);
}

/// Initialize the logger, optionally writing to a rolling log file
pub fn init_logger_with_file(log_level: Option<&str>, log_dir: Option<&Path>) {
    let level = log_level.unwrap_or("info");

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level.parse().unwrap_or(tracing::Level::INFO))
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir
        && dir.exists()
        && let Some(dir_str) = dir.to_str()
    {
        let file_appender = tracing_appender::rolling::daily(dir_str, "skald");
        subscriber.with_writer(file_appender).init();
        return;
    }

    subscriber.init();
}
