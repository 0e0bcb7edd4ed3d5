//! Client-side storage for the HW Legacy Group portal.
//!
//! Two tiers mirror what a browser client holds:
//! - **ephemeral**: [`MemoryStorage`], gone when the process exits
//! - **persistent**: [`FileStorage`], a JSON file at `~/.hwlg/local-storage.json`
//!
//! [`SessionStore`] keeps the auth session in one of them and can purge both.

mod file;
mod keys;
mod memory;
mod session;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use session::{SessionMeta, SessionStore};
pub use traits::ClientStorage;

use portal_config_and_utils::Paths;
use std::sync::Arc;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the persistent storage tier under `paths`.
pub fn create_storage(paths: &Paths) -> StorageResult<Arc<dyn ClientStorage>> {
    let storage = FileStorage::open(paths.local_storage_file())?;
    Ok(Arc::new(storage))
}

/// Create a SessionStore over a fresh ephemeral tier and the persistent tier
/// under `paths`.
pub fn create_session_store(paths: &Paths, persist_session: bool) -> StorageResult<SessionStore> {
    let persistent = create_storage(paths)?;
    let ephemeral: Arc<dyn ClientStorage> = Arc::new(MemoryStorage::new());
    Ok(SessionStore::new(persistent, ephemeral, persist_session))
}
