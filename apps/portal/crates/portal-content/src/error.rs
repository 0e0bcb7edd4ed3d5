//! Content error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentError {
    /// Slug is not lowercase letters, digits and single hyphens
    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    /// A required field is missing or empty
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No row matched
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row-level security rejected the request
    #[error("Permission denied: HTTP {status}")]
    PermissionDenied { status: u16 },

    /// Unexpected non-success response
    #[error("API error: HTTP {status} ({summary})")]
    Api { status: u16, summary: String },

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

pub type ContentResult<T> = Result<T, ContentError>;
