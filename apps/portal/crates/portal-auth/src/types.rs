//! Session, identity and role types shared by the controller and providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

/// Authorization role stored in the role table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A live provider session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Kind of session change reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// Session-change notification: the event kind plus the session (if any)
/// that is current after the change.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub kind: AuthChangeEvent,
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn new(kind: AuthChangeEvent, session: Option<Session>) -> Self {
        Self { kind, session }
    }
}

/// Result of account creation.
///
/// `session` is `None` when the provider requires email confirmation before
/// the first sign-in.
#[derive(Debug, Clone)]
pub struct AccountCreation {
    pub identity: Identity,
    pub session: Option<Session>,
}

/// Process-wide session state.
///
/// `role` is only meaningful while `identity` is set; the controller clears
/// both in the same update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub role: Option<Role>,
    pub loading: bool,
}

impl SessionState {
    /// State before the startup session check completes.
    pub fn initial() -> Self {
        Self {
            identity: None,
            role: None,
            loading: true,
        }
    }

    /// Settled signed-out state.
    pub fn signed_out() -> Self {
        Self {
            identity: None,
            role: None,
            loading: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.identity.is_some() && self.role == Some(Role::Admin)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial()
    }
}
