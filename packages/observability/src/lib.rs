//! # Observability
//!
//! Central logging layer for the HW Legacy Group portal.
//!
//! Binaries call [`init`] or [`init_with_config`] once at startup and then use
//! plain `tracing` macros everywhere else. Library crates never install a
//! subscriber themselves.
//!
//! Every event is written as one JSON line to `~/.hwlg/logs/portal.jsonl`
//! (or a custom path), which keeps the output greppable with `jq`:
//!
//! ```text
//! tail -f ~/.hwlg/logs/portal.jsonl | jq 'select(.level == "WARN")'
//! ```
//!
//! Fields whose names look like credentials (`password`, `access_token`,
//! `refresh_token`, `apikey`, `authorization`) are replaced with
//! `"[redacted]"` before they reach the file.
//!
//! ## Usage
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "hwlg".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!(user_id = %id, "signed in");
//! ```

mod json_layer;
mod writer;

use std::path::PathBuf;

pub use json_layer::{is_sensitive_field, JsonLayer, LogEntry, REDACTED};
pub use writer::{default_log_path, CentralLogWriter, WriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service written into every log line.
    pub service_name: String,

    /// Default filter (e.g. "debug", "info", "portal_auth=trace").
    /// `RUST_LOG` wins when it is set.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.hwlg/logs/portal.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit compact human-readable logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with default settings for `service_name`.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with a custom configuration.
///
/// When the log file cannot be opened the subscriber falls back to stderr
/// only. Calling this twice is a no-op for the second call.
pub fn init_with_config(config: LogConfig) {
    writer::init_file_subscriber(&config);
}

pub use tracing::{debug, error, info, instrument, trace, warn, Level};
