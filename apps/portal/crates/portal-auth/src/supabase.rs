//! Supabase implementation of the identity provider and role directory.
//!
//! Talks to GoTrue (`/auth/v1`) for credentials and sessions and to
//! PostgREST (`/rest/v1`) for the role table. Sessions are kept in a
//! [`SessionStore`] so they survive restarts when persistence is enabled.

use crate::provider::{AuthEventBus, AuthSubscription, IdentityProvider, RoleDirectory};
use crate::{
    AccountCreation, AuthChangeEvent, AuthError, AuthEvent, AuthResult, Identity, Role, Session,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use portal_config_and_utils::{summarize_response_body, Config};
use portal_storage::{SessionMeta, SessionStore};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for retry behavior during token refresh.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum number of attempts.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

#[derive(Debug, Serialize)]
struct CredentialsRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// GoTrue token response (password grant, refresh grant, auto-confirmed signup).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: UserRecord,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl UserRecord {
    fn into_identity(self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    #[serde(default)]
    role: Option<String>,
}

/// Supabase client implementing [`IdentityProvider`] and [`RoleDirectory`].
pub struct SupabaseAuthClient {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
    role_table: String,
    store: Arc<SessionStore>,
    events: AuthEventBus,
    refresh_config: RefreshConfig,
}

impl SupabaseAuthClient {
    /// Create a new Supabase client.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project API URL (e.g., `https://xyz.supabase.co`)
    /// * `anon_key` - The Supabase anonymous API key
    /// * `store` - Where sessions are kept between calls
    pub fn new(
        api_url: impl Into<String>,
        anon_key: impl Into<String>,
        store: Arc<SessionStore>,
    ) -> Self {
        let api_url: String = api_url.into();
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            role_table: portal_config_and_utils::DEFAULT_ROLE_TABLE.to_string(),
            store,
            events: AuthEventBus::new(),
            refresh_config: RefreshConfig::default(),
        }
    }

    /// Create a client from the loaded configuration.
    pub fn from_config(config: &Config, store: Arc<SessionStore>) -> Self {
        Self::new(config.supabase_api_base(), &config.supabase_anon_key, store)
            .with_role_table(&config.role_table)
    }

    pub fn with_role_table(mut self, table: impl Into<String>) -> Self {
        self.role_table = table.into();
        self
    }

    pub fn with_refresh_config(mut self, refresh_config: RefreshConfig) -> Self {
        self.refresh_config = refresh_config;
        self
    }

    /// Access token of the stored session, if any.
    pub fn access_token(&self) -> AuthResult<Option<String>> {
        Ok(self.store.get_access_token()?)
    }

    /// Base URL of the Supabase project.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    /// Persist a token response and turn it into a [`Session`].
    fn store_token_response(&self, data: TokenResponse) -> AuthResult<Session> {
        let expires_at = Utc::now() + ChronoDuration::seconds(data.expires_in);
        let identity = data.user.into_identity();

        self.store.set_session(
            &data.access_token,
            &data.refresh_token,
            &SessionMeta {
                user_id: identity.id.clone(),
                email: identity.email.clone(),
                expires_at,
            },
        )?;

        Ok(Session {
            access_token: data.access_token,
            refresh_token: data.refresh_token,
            expires_at,
            identity,
        })
    }

    /// Read the stored session without touching the network.
    fn stored_session(&self) -> AuthResult<Option<Session>> {
        if !self.store.has_session()? {
            return Ok(None);
        }
        let (Some(meta), Some(access_token)) =
            (self.store.get_session_meta()?, self.store.get_access_token()?)
        else {
            info!("Stored session is incomplete, clearing it");
            self.store.clear_session()?;
            return Ok(None);
        };
        let refresh_token = self.store.get_refresh_token()?.unwrap_or_default();

        Ok(Some(Session {
            access_token,
            refresh_token,
            expires_at: meta.expires_at,
            identity: Identity {
                id: meta.user_id,
                email: meta.email,
            },
        }))
    }

    /// Refresh the session with exponential backoff retry.
    async fn refresh_with_backoff(&self, refresh_token: &str) -> AuthResult<Session> {
        for attempt in 0..self.refresh_config.max_retries {
            match self.try_refresh(refresh_token).await {
                Ok(session) => return Ok(session),
                Err(e) if e.is_transient() => {
                    if attempt + 1 < self.refresh_config.max_retries {
                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_retries = self.refresh_config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Refresh failed with non-transient error");
                    return Err(e);
                }
            }
        }

        warn!(
            max_retries = self.refresh_config.max_retries,
            "Refresh retries exhausted"
        );
        Err(AuthError::RefreshExhausted(self.refresh_config.max_retries))
    }

    /// Single attempt to refresh the session.
    async fn try_refresh(&self, refresh_token: &str) -> AuthResult<Session> {
        let url = self.auth_url("token?grant_type=refresh_token");
        debug!(url = %url, "Refreshing token");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, body_summary = %body_summary, "Token refresh failed");
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                return Err(AuthError::Api {
                    status: status.as_u16(),
                    summary: body_summary,
                });
            }
            return Err(AuthError::TokenRefresh(format!(
                "HTTP {} ({})",
                status, body_summary
            )));
        }

        let data: TokenResponse = response.json().await?;
        let session = self.store_token_response(data)?;
        info!(user_id = %session.identity.id, "Token refreshed successfully");
        Ok(session)
    }

    async fn post_credentials(&self, path: &str, email: &str, password: &str) -> AuthResult<reqwest::Response> {
        let url = self.auth_url(path);
        debug!(url = %url, email = %email, "Posting credentials");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&CredentialsRequest { email, password })
            .send()
            .await?;
        Ok(response)
    }
}

/// Map a failed credential request to an error.
///
/// 4xx responses are the user's fault; anything else is an API failure.
async fn credential_failure(
    response: reqwest::Response,
    reject: fn(String) -> AuthError,
    context: &str,
) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body_summary = summarize_response_body(&body);
    warn!(status = %status, body_summary = %body_summary, "{context} failed");

    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        reject(format!("HTTP {} ({})", status, body_summary))
    } else {
        AuthError::Api {
            status: status.as_u16(),
            summary: body_summary,
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuthClient {
    async fn get_session(&self) -> AuthResult<Option<Session>> {
        let Some(session) = self.stored_session()? else {
            return Ok(None);
        };

        if !self.store.is_session_expired()? {
            return Ok(Some(session));
        }

        if session.refresh_token.is_empty() {
            warn!(user_id = %session.identity.id, "Session expired without refresh token, clearing session");
            self.store.clear_session()?;
            return Ok(None);
        }

        info!(user_id = %session.identity.id, "Stored session expired, attempting refresh");
        match self.refresh_with_backoff(&session.refresh_token).await {
            Ok(refreshed) => {
                self.events.emit(AuthEvent::new(
                    AuthChangeEvent::TokenRefreshed,
                    Some(refreshed.clone()),
                ));
                Ok(Some(refreshed))
            }
            // Keep the tokens; the next call can try again once the network is back.
            Err(e @ AuthError::RefreshExhausted(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, "Refresh rejected, clearing session");
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    async fn verify_credentials(&self, email: &str, password: &str) -> AuthResult<Session> {
        let response = self
            .post_credentials("token?grant_type=password", email, password)
            .await?;

        if !response.status().is_success() {
            return Err(credential_failure(response, AuthError::InvalidCredentials, "Login").await);
        }

        let data: TokenResponse = response.json().await?;
        let session = self.store_token_response(data)?;
        info!(user_id = %session.identity.id, "Login successful");

        self.events
            .emit(AuthEvent::new(AuthChangeEvent::SignedIn, Some(session.clone())));
        Ok(session)
    }

    async fn create_account(&self, email: &str, password: &str) -> AuthResult<AccountCreation> {
        let response = self.post_credentials("signup", email, password).await?;

        if !response.status().is_success() {
            return Err(credential_failure(response, AuthError::AccountRejected, "Signup").await);
        }

        let body: serde_json::Value = response.json().await?;

        if body.get("access_token").is_some() {
            let data: TokenResponse = serde_json::from_value(body)?;
            let session = self.store_token_response(data)?;
            info!(user_id = %session.identity.id, "Account created and signed in");
            self.events
                .emit(AuthEvent::new(AuthChangeEvent::SignedIn, Some(session.clone())));
            return Ok(AccountCreation {
                identity: session.identity.clone(),
                session: Some(session),
            });
        }

        // Email confirmation pending: GoTrue returns the bare user, either at
        // the top level or nested under "user".
        let user_value = match body.get("user") {
            Some(user) => user.clone(),
            None => body,
        };
        let user: UserRecord = serde_json::from_value(user_value)?;
        let identity = user.into_identity();
        info!(user_id = %identity.id, "Account created, confirmation pending");

        Ok(AccountCreation {
            identity,
            session: None,
        })
    }

    async fn terminate_session(&self) -> AuthResult<()> {
        let Some(access_token) = self.store.get_access_token()? else {
            debug!("No stored session to terminate");
            self.store.clear_session()?;
            self.events.emit(AuthEvent::new(AuthChangeEvent::SignedOut, None));
            return Ok(());
        };

        let url = self.auth_url("logout");
        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        let status = response.status();
        let already_gone = matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        );

        if !status.is_success() && !already_gone {
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, body_summary = %body_summary, "Logout rejected");
            return Err(AuthError::SignOut(format!(
                "HTTP {} ({})",
                status, body_summary
            )));
        }

        if already_gone {
            debug!(status = %status, "Hosted session already gone");
        }

        self.store.clear_session()?;
        info!("Logged out");
        self.events.emit(AuthEvent::new(AuthChangeEvent::SignedOut, None));
        Ok(())
    }
}

#[async_trait]
impl RoleDirectory for SupabaseAuthClient {
    async fn lookup_role(&self, user_id: &str) -> AuthResult<Option<Role>> {
        let bearer = self
            .store
            .get_access_token()?
            .unwrap_or_else(|| self.anon_key.clone());

        let response = self
            .http_client
            .get(self.rest_url(&self.role_table))
            .query(&[
                ("id", format!("eq.{}", user_id)),
                ("select", "role".to_string()),
                ("limit", "1".to_string()),
            ])
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, body_summary = %body_summary, "Failed to fetch role");
            return Err(AuthError::RoleLookup(format!(
                "HTTP {} ({})",
                status, body_summary
            )));
        }

        let rows: Vec<RoleRow> = response.json().await?;
        let Some(raw) = rows.into_iter().next().and_then(|row| row.role) else {
            debug!(user_id = %user_id, "No role row");
            return Ok(None);
        };

        match raw.parse::<Role>() {
            Ok(role) => Ok(Some(role)),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Ignoring unrecognized role");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_storage::{FileStorage, MemoryStorage};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_store() -> Arc<SessionStore> {
        Arc::new(SessionStore::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
            true,
        ))
    }

    fn create_client(server: &MockServer, store: Arc<SessionStore>) -> SupabaseAuthClient {
        SupabaseAuthClient::new(server.uri(), "test-anon-key", store).with_refresh_config(
            RefreshConfig {
                max_retries: 3,
                initial_delay_ms: 1,
                max_delay_ms: 5,
            },
        )
    }

    fn token_body(user_id: &str, access: &str) -> serde_json::Value {
        serde_json::json!({
            "access_token": access,
            "refresh_token": format!("refresh-{access}"),
            "expires_in": 3600,
            "token_type": "bearer",
            "user": { "id": user_id, "email": format!("{user_id}@example.com") }
        })
    }

    fn store_session(store: &SessionStore, user_id: &str, expires_in: ChronoDuration) {
        store
            .set_session(
                "stored-access",
                "stored-refresh",
                &SessionMeta {
                    user_id: user_id.to_string(),
                    email: format!("{user_id}@example.com"),
                    expires_at: Utc::now() + expires_in,
                },
            )
            .unwrap();
    }

    #[test]
    fn test_refresh_config_default() {
        let config = RefreshConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 5000);
    }

    #[test]
    fn test_refresh_config_delay_exponential_backoff() {
        let config = RefreshConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(5000));
        assert_eq!(config.delay_for_attempt(40), Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn test_verify_credentials_stores_session_and_emits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "test-anon-key"))
            .and(body_json(serde_json::json!({
                "email": "u1@example.com",
                "password": "hunter2"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("u1", "tok-1")))
            .expect(1)
            .mount(&server)
            .await;

        let store = create_store();
        let client = create_client(&server, store.clone());
        let mut events = client.subscribe();

        let session = client
            .verify_credentials("u1@example.com", "hunter2")
            .await
            .unwrap();

        assert_eq!(session.identity.id, "u1");
        assert_eq!(store.get_access_token().unwrap(), Some("tok-1".to_string()));
        assert!(!store.is_session_expired().unwrap());

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, AuthChangeEvent::SignedIn);
        assert_eq!(event.session.unwrap().identity.email, "u1@example.com");
    }

    #[tokio::test]
    async fn test_verify_credentials_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let store = create_store();
        let client = create_client(&server, store.clone());

        let err = client
            .verify_credentials("u1@example.com", "wrong")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        assert!(!err.to_string().contains("Invalid login credentials"));
        assert!(!store.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_verify_credentials_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = create_client(&server, create_store());
        let err = client
            .verify_credentials("u1@example.com", "pw")
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(!err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_create_account_with_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("u2", "tok-2")))
            .mount(&server)
            .await;

        let store = create_store();
        let client = create_client(&server, store.clone());

        let created = client.create_account("u2@example.com", "pw").await.unwrap();
        assert_eq!(created.identity.id, "u2");
        assert!(created.session.is_some());
        assert!(store.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_create_account_confirmation_pending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "u3",
                "email": "u3@example.com",
                "confirmation_sent_at": "2024-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let store = create_store();
        let client = create_client(&server, store.clone());

        let created = client.create_account("u3@example.com", "pw").await.unwrap();
        assert_eq!(created.identity.id, "u3");
        assert!(created.session.is_none());
        assert!(!store.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_create_account_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(422).set_body_string("User already registered"))
            .mount(&server)
            .await;

        let client = create_client(&server, create_store());
        let err = client.create_account("dup@example.com", "pw").await.unwrap_err();

        assert!(matches!(err, AuthError::AccountRejected(_)));
    }

    #[tokio::test]
    async fn test_get_session_none_when_empty() {
        let server = MockServer::start().await;
        let client = create_client(&server, create_store());

        assert!(client.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_session_returns_valid_stored_session() {
        let server = MockServer::start().await;
        let store = create_store();
        store_session(&store, "u1", ChronoDuration::hours(1));
        let client = create_client(&server, store);

        let session = client.get_session().await.unwrap().unwrap();
        assert_eq!(session.identity.id, "u1");
        assert_eq!(session.access_token, "stored-access");
    }

    #[tokio::test]
    async fn test_get_session_refreshes_expired_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(serde_json::json!({ "refresh_token": "stored-refresh" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("u1", "fresh")))
            .expect(1)
            .mount(&server)
            .await;

        let store = create_store();
        store_session(&store, "u1", ChronoDuration::seconds(-10));
        let client = create_client(&server, store.clone());

        let mut events = client.subscribe();

        let session = client.get_session().await.unwrap().unwrap();
        assert_eq!(session.access_token, "fresh");
        assert_eq!(store.get_access_token().unwrap(), Some("fresh".to_string()));

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, AuthChangeEvent::TokenRefreshed);
        assert_eq!(event.session.unwrap().access_token, "fresh");
    }

    #[tokio::test]
    async fn test_session_persists_in_file_storage_across_clients() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("u1", "tok-1")))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("local-storage.json");
        let file_store = || {
            Arc::new(SessionStore::new(
                Arc::new(FileStorage::open(&file).unwrap()),
                Arc::new(MemoryStorage::new()),
                true,
            ))
        };

        create_client(&server, file_store())
            .verify_credentials("u1@example.com", "pw")
            .await
            .unwrap();

        // A fresh client over the same file sees the session without a request.
        let session = create_client(&server, file_store())
            .get_session()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.identity.id, "u1");
        assert_eq!(session.access_token, "tok-1");
    }

    #[tokio::test]
    async fn test_get_session_rejected_refresh_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let store = create_store();
        store_session(&store, "u1", ChronoDuration::seconds(-10));
        let client = create_client(&server, store.clone());

        assert!(client.get_session().await.unwrap().is_none());
        assert!(!store.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_get_session_transient_refresh_retries_then_keeps_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let store = create_store();
        store_session(&store, "u1", ChronoDuration::seconds(-10));
        let client = create_client(&server, store.clone());

        let err = client.get_session().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshExhausted(3)));
        assert!(store.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_terminate_session_success_clears_and_emits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header("Authorization", "Bearer stored-access"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = create_store();
        store_session(&store, "u1", ChronoDuration::hours(1));
        let client = create_client(&server, store.clone());
        let mut events = client.subscribe();

        client.terminate_session().await.unwrap();

        assert!(!store.has_session().unwrap());
        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, AuthChangeEvent::SignedOut);
        assert!(event.session.is_none());
    }

    #[tokio::test]
    async fn test_terminate_session_already_gone_counts_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = create_store();
        store_session(&store, "u1", ChronoDuration::hours(1));
        let client = create_client(&server, store.clone());

        client.terminate_session().await.unwrap();
        assert!(!store.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_terminate_session_failure_keeps_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = create_store();
        store_session(&store, "u1", ChronoDuration::hours(1));
        let client = create_client(&server, store.clone());

        let err = client.terminate_session().await.unwrap_err();
        assert!(matches!(err, AuthError::SignOut(_)));
        assert!(store.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_terminate_without_session_is_ok() {
        let server = MockServer::start().await;
        let client = create_client(&server, create_store());

        client.terminate_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_lookup_role_admin_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("id", "eq.u1"))
            .and(query_param("select", "role"))
            .and(query_param("limit", "1"))
            .and(header("Authorization", "Bearer stored-access"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "role": "admin" }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = create_store();
        store_session(&store, "u1", ChronoDuration::hours(1));
        let client = create_client(&server, store);

        assert_eq!(client.lookup_role("u1").await.unwrap(), Some(Role::Admin));
    }

    #[tokio::test]
    async fn test_lookup_role_uses_anon_key_without_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(header("Authorization", "Bearer test-anon-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "role": "user" }])),
            )
            .mount(&server)
            .await;

        let client = create_client(&server, create_store()).with_role_table("profiles");
        assert_eq!(client.lookup_role("u1").await.unwrap(), Some(Role::User));
    }

    #[tokio::test]
    async fn test_lookup_role_missing_or_unknown_row() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("id", "eq.nobody"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("id", "eq.odd"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "role": "owner" }])),
            )
            .mount(&server)
            .await;

        let client = create_client(&server, create_store());
        assert_eq!(client.lookup_role("nobody").await.unwrap(), None);
        assert_eq!(client.lookup_role("odd").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookup_role_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = create_client(&server, create_store());
        let err = client.lookup_role("u1").await.unwrap_err();
        assert!(matches!(err, AuthError::RoleLookup(_)));
    }
}
