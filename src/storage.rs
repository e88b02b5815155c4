//! Seek history persistence
//!
//! Histories are stored per session under `seekHistory_<id>` as a list of
//! `StoredSeek` records, trimmed to the last `HISTORY_CAPACITY` entries.
//! Persistence is best effort: callers log failures and carry on with the
//! in-memory history.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;
use tracing::error;

use crate::seek::{HISTORY_CAPACITY, StoredSeek};
use crate::session::SessionId;

/// Errors from a `SeekStore`
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous key-value store for seek histories
#[async_trait]
pub trait SeekStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<StoredSeek>>, StorageError>;

    async fn set(&self, key: &str, value: &[StoredSeek]) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage key for a session's history
pub fn history_key(id: SessionId) -> String {
    format!("seekHistory_{}", id)
}

/// Store a session's history, keeping only the newest entries
pub async fn save_history(
    store: &dyn SeekStore,
    id: SessionId,
    history: &[StoredSeek],
) -> Result<(), StorageError> {
    let start = history.len().saturating_sub(HISTORY_CAPACITY);
    store.set(&history_key(id), &history[start..]).await
}

/// Delete a session's stored history, logging failures
pub async fn clear_history(store: &dyn SeekStore, id: SessionId) {
    if let Err(e) = store.remove(&history_key(id)).await {
        error!("Failed to clear seek history for session {}: {}", id, e);
    }
}
