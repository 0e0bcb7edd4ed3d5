//! Errors raised while locating, reading or validating local settings.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A config value is present but unusable
    #[error("Invalid config `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("Could not determine the home directory")]
    HomeDirUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid Supabase URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Malformed config file
    #[error("Config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        CoreError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
