//! In-process checkpoint backend

use crate::record::MatchRecord;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use crate::storage::PersistedState;
use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Keeps the checkpoint and results in memory
///
/// Used by tests and by callers that do not need durability. Writes can be
/// made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryStore {
    checkpoint: Mutex<Option<PersistedState>>,
    results: Mutex<Option<Vec<MatchRecord>>>,
    fail_writes: AtomicBool,
    result_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail with an IO error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful full result writes
    pub fn result_writes(&self) -> usize {
        self.result_writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "writes disabled",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn save_checkpoint(&self, state: &PersistedState) -> StorageResult<()> {
        self.check_writable()?;
        *self.checkpoint.lock().unwrap_or_else(|e| e.into_inner()) = Some(state.clone());
        Ok(())
    }

    async fn load_checkpoint(&self) -> StorageResult<Option<PersistedState>> {
        Ok(self
            .checkpoint
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn delete_checkpoint(&self) -> StorageResult<()> {
        *self.checkpoint.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }

    async fn save_results(&self, records: &[MatchRecord]) -> StorageResult<()> {
        self.check_writable()?;
        *self.results.lock().unwrap_or_else(|e| e.into_inner()) = Some(records.to_vec());
        self.result_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_results(&self) -> StorageResult<Vec<MatchRecord>> {
        Ok(self
            .results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_default())
    }

    async fn delete_results(&self) -> StorageResult<()> {
        *self.results.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
