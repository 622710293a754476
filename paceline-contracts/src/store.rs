//! The extension's key-value settings storage.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Raw key/value pairs as held by the extension storage area.
pub type StoreEntries = Map<String, Value>;

/// Failures of the storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing data could not be (de)serialized.
    #[error("stored settings are not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value has a shape the backend cannot hold.
    #[error("stored value for `{key}` is malformed: {reason}")]
    Malformed {
        /// Offending key, or the backing file when the whole document is wrong.
        key: String,
        /// What was found instead.
        reason: String,
    },

    /// The backend refused the call.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Key/value persistence shared by every extension context.
///
/// Writes are last-write-wins per key. A context only observes another
/// context's write once the backend has confirmed it, so callers must not
/// assume read-after-write ordering across contexts.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Fetch the listed keys. Keys that were never written are absent from
    /// the returned map rather than an error.
    async fn get(&self, keys: &[&str]) -> Result<StoreEntries, StoreError>;

    /// Merge `entries` into the store, replacing existing values per key.
    async fn set(&self, entries: StoreEntries) -> Result<(), StoreError>;
}
