//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::record::MatchRecord;
use crate::storage::PersistedState;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt checkpoint at {path}: {message}")]
    Corrupt { path: String, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint backends
///
/// A backend holds two blobs: the light progress checkpoint, rewritten after
/// every item, and the full result set, rewritten every few completions.
/// Missing blobs are not errors.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Overwrites the progress checkpoint
    async fn save_checkpoint(&self, state: &PersistedState) -> StorageResult<()>;

    /// Reads the progress checkpoint, if one was saved
    async fn load_checkpoint(&self) -> StorageResult<Option<PersistedState>>;

    /// Removes the progress checkpoint
    async fn delete_checkpoint(&self) -> StorageResult<()>;

    /// Overwrites the accumulated result set
    async fn save_results(&self, records: &[MatchRecord]) -> StorageResult<()>;

    /// Reads the accumulated result set, empty if none was saved
    async fn load_results(&self) -> StorageResult<Vec<MatchRecord>>;

    /// Removes the accumulated result set
    async fn delete_results(&self) -> StorageResult<()>;
}
