//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
///
/// A missing session is never an error: providers report it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Invalid email or password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Account creation was rejected (duplicate email, weak password, ...)
    #[error("Account creation rejected: {0}")]
    AccountRejected(String),

    /// The provider refused to terminate the session
    #[error("Sign-out failed: {0}")]
    SignOut(String),

    /// Role lookup failed
    #[error("Role lookup failed: {0}")]
    RoleLookup(String),

    /// Token refresh error
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// Refresh retries exhausted
    #[error("Token refresh failed after {0} attempts")]
    RefreshExhausted(u32),

    /// Session was invalidated server-side
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    /// An operation needed a session and there is none
    #[error("Not logged in")]
    NotLoggedIn,

    /// Unexpected non-success response from the hosted API
    #[error("API error: HTTP {status} ({summary})")]
    Api { status: u16, summary: String },

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] portal_storage::StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Network unavailable (transient error, can retry)
    #[error("Network unavailable")]
    NetworkUnavailable,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Network unavailable and timeouts
    /// - Connection failures
    /// - 5xx and 429 responses
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::NetworkUnavailable => true,
            AuthError::Timeout => true,
            AuthError::Api { status, .. } => *status >= 500 || *status == 429,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }

    /// Returns true for failures caused by the user's credentials or input.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials(_) | AuthError::AccountRejected(_)
        )
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
