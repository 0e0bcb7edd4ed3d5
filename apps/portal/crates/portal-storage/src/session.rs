//! High-level API for the stored auth session.

use crate::{ClientStorage, StorageError, StorageKeys, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Seconds of remaining validity below which a session counts as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Session metadata stored next to the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    /// User ID from Supabase Auth
    pub user_id: String,
    /// User email from Supabase Auth
    #[serde(default)]
    pub email: String,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

/// Stores the auth session in one of two client storage tiers.
///
/// Tokens go to the persistent tier when `persist_session` is set and to the
/// ephemeral tier otherwise. [`SessionStore::purge_all`] wipes both.
pub struct SessionStore {
    persistent: Arc<dyn ClientStorage>,
    ephemeral: Arc<dyn ClientStorage>,
    persist_session: bool,
}

impl SessionStore {
    pub fn new(
        persistent: Arc<dyn ClientStorage>,
        ephemeral: Arc<dyn ClientStorage>,
        persist_session: bool,
    ) -> Self {
        Self {
            persistent,
            ephemeral,
            persist_session,
        }
    }

    fn tier(&self) -> &dyn ClientStorage {
        if self.persist_session {
            self.persistent.as_ref()
        } else {
            self.ephemeral.as_ref()
        }
    }

    /// Store access token
    pub fn set_access_token(&self, token: &str) -> StorageResult<()> {
        self.tier().set(StorageKeys::ACCESS_TOKEN, token)
    }

    /// Retrieve access token
    pub fn get_access_token(&self) -> StorageResult<Option<String>> {
        self.tier().get(StorageKeys::ACCESS_TOKEN)
    }

    /// Store refresh token
    pub fn set_refresh_token(&self, token: &str) -> StorageResult<()> {
        self.tier().set(StorageKeys::REFRESH_TOKEN, token)
    }

    /// Retrieve refresh token
    pub fn get_refresh_token(&self) -> StorageResult<Option<String>> {
        self.tier().get(StorageKeys::REFRESH_TOKEN)
    }

    /// Store session metadata
    pub fn set_session_meta(&self, meta: &SessionMeta) -> StorageResult<()> {
        let json =
            serde_json::to_string(meta).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.tier().set(StorageKeys::SESSION_META, &json)
    }

    /// Retrieve session metadata
    pub fn get_session_meta(&self) -> StorageResult<Option<SessionMeta>> {
        match self.tier().get(StorageKeys::SESSION_META)? {
            Some(json) => {
                let meta: SessionMeta = serde_json::from_str(&json)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    /// Check if a session exists
    pub fn has_session(&self) -> StorageResult<bool> {
        let has_token = self.tier().has(StorageKeys::ACCESS_TOKEN)?;
        let has_meta = self.tier().has(StorageKeys::SESSION_META)?;
        Ok(has_token && has_meta)
    }

    /// Check if the stored session is expired (or about to be)
    pub fn is_session_expired(&self) -> StorageResult<bool> {
        match self.get_session_meta()? {
            Some(meta) => {
                let remaining = meta.expires_at.signed_duration_since(Utc::now());
                Ok(remaining.num_seconds() < EXPIRY_MARGIN_SECS)
            }
            None => Ok(true),
        }
    }

    /// Store a complete session (tokens + metadata)
    pub fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
        meta: &SessionMeta,
    ) -> StorageResult<()> {
        self.set_access_token(access_token)?;
        self.set_refresh_token(refresh_token)?;
        self.set_session_meta(meta)?;
        Ok(())
    }

    /// Remove the stored session from the active tier
    pub fn clear_session(&self) -> StorageResult<()> {
        let _ = self.tier().delete(StorageKeys::ACCESS_TOKEN);
        let _ = self.tier().delete(StorageKeys::REFRESH_TOKEN);
        let _ = self.tier().delete(StorageKeys::SESSION_META);
        Ok(())
    }

    /// Wipe every entry from both tiers.
    ///
    /// Both tiers are attempted even when the first one fails; the first
    /// error is returned.
    pub fn purge_all(&self) -> StorageResult<()> {
        let persistent = self.persistent.clear();
        let ephemeral = self.ephemeral.clear();
        tracing::debug!(
            persistent_ok = persistent.is_ok(),
            ephemeral_ok = ephemeral.is_ok(),
            "purged client storage"
        );
        persistent.and(ephemeral)
    }
}
