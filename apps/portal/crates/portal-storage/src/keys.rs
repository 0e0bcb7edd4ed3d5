//! Storage key constants.

/// Storage keys used by the portal client
pub struct StorageKeys;

impl StorageKeys {
    /// Supabase access token
    pub const ACCESS_TOKEN: &'static str = "hwlg.auth.access_token";

    /// Supabase refresh token
    pub const REFRESH_TOKEN: &'static str = "hwlg.auth.refresh_token";

    /// Session metadata (JSON)
    pub const SESSION_META: &'static str = "hwlg.auth.session_meta";
}
