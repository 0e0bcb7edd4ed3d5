//! Logging bootstrap for portal binaries.
//!
//! Thin wrapper over the `observability` crate so every binary logs the same
//! way: JSONL to `~/.hwlg/logs/portal.jsonl`, level from `RUST_LOG` or the
//! configured default.

use crate::Paths;

/// Initialize logging for `service_name`.
///
/// `also_stderr` mirrors events to stderr in a compact format, which is what
/// interactive commands want when `--log-level debug` is passed.
pub fn init_logging(service_name: &str, level: &str, paths: &Paths, also_stderr: bool) {
    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
