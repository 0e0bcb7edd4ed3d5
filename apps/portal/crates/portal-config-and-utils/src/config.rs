//! Configuration management for the portal client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Supabase project URL (override at compile time via SUPABASE_URL).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://hwlegacygroup.supabase.co",
};

/// Default Supabase anon key (override at compile time via SUPABASE_ANON_KEY).
pub const DEFAULT_SUPABASE_ANON_KEY: &str = match option_env!("SUPABASE_ANON_KEY") {
    Some(key) => key,
    None => "anon-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Table holding the `role` column keyed by user id.
pub const DEFAULT_ROLE_TABLE: &str = "users";

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase anon API key (public, safe to ship).
    #[serde(default = "default_supabase_anon_key")]
    pub supabase_anon_key: String,
    /// Keep the session in persistent storage across runs.
    #[serde(default = "default_persist_session")]
    pub persist_session: bool,
    /// Table used for role lookups.
    #[serde(default = "default_role_table")]
    pub role_table: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_anon_key() -> String {
    DEFAULT_SUPABASE_ANON_KEY.to_string()
}

fn default_persist_session() -> bool {
    true
}

fn default_role_table() -> String {
    DEFAULT_ROLE_TABLE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_url: default_supabase_url(),
            supabase_anon_key: default_supabase_anon_key(),
            persist_session: default_persist_session(),
            role_table: default_role_table(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file (if any), then apply
    /// environment overrides and validate.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Some(level) = env_value("HWLG_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = env_value("HWLG_SUPABASE_URL") {
            self.supabase_url = url;
        }
        if let Some(key) = env_value("HWLG_SUPABASE_ANON_KEY") {
            self.supabase_anon_key = key;
        }
        if let Some(raw) = env_value("HWLG_PERSIST_SESSION") {
            match parse_bool(&raw) {
                Some(persist) => self.persist_session = persist,
                None => tracing::warn!(value = %raw, "ignoring invalid HWLG_PERSIST_SESSION"),
            }
        }
    }

    /// Check that the Supabase settings are usable.
    pub fn validate(&self) -> CoreResult<()> {
        let url = self.supabase_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::invalid(
                "supabase_url",
                format!("expected http or https, got {}", url.scheme()),
            ));
        }
        if self.supabase_anon_key.trim().is_empty() {
            return Err(CoreError::invalid("supabase_anon_key", "empty"));
        }
        if self.role_table.trim().is_empty() {
            return Err(CoreError::invalid("role_table", "empty"));
        }
        Ok(())
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }

    /// Supabase URL without a trailing slash, ready for path joining.
    pub fn supabase_api_base(&self) -> String {
        self.supabase_url.trim_end_matches('/').to_string()
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
