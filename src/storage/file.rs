//! JSON file checkpoint backend

use crate::record::MatchRecord;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use crate::storage::{PersistedState, CHECKPOINT_VERSION};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores the checkpoint and the results as two JSON files
///
/// Each write goes to `<path>.tmp` first and is renamed over the target, so a
/// crash mid-write leaves the previous file intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    checkpoint_path: PathBuf,
    results_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(checkpoint_path: impl Into<PathBuf>, results_path: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_path: checkpoint_path.into(),
            results_path: results_path.into(),
        }
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }
}

async fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_optional<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

async fn remove_if_present(path: &Path) -> StorageResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CheckpointStore for JsonFileStore {
    async fn save_checkpoint(&self, state: &PersistedState) -> StorageResult<()> {
        write_atomic(&self.checkpoint_path, state).await
    }

    async fn load_checkpoint(&self) -> StorageResult<Option<PersistedState>> {
        let state: Option<PersistedState> = read_optional(&self.checkpoint_path).await?;
        match state {
            Some(state) if state.version != CHECKPOINT_VERSION => Err(StorageError::Corrupt {
                path: self.checkpoint_path.display().to_string(),
                message: format!("unsupported checkpoint version {}", state.version),
            }),
            other => Ok(other),
        }
    }

    async fn delete_checkpoint(&self) -> StorageResult<()> {
        remove_if_present(&self.checkpoint_path).await
    }

    async fn save_results(&self, records: &[MatchRecord]) -> StorageResult<()> {
        write_atomic(&self.results_path, records).await
    }

    async fn load_results(&self) -> StorageResult<Vec<MatchRecord>> {
        Ok(read_optional(&self.results_path).await?.unwrap_or_default())
    }

    async fn delete_results(&self) -> StorageResult<()> {
        remove_if_present(&self.results_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FailureRecord, JobMode, JobOptions};
    use crate::storage::ResultsMarker;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> JsonFileStore {
        JsonFileStore::new(
            dir.path().join("checkpoint.json"),
            dir.path().join("nested").join("results.json"),
        )
    }

    fn state() -> PersistedState {
        PersistedState {
            version: CHECKPOINT_VERSION,
            mode: JobMode::Range,
            match_ids: vec![10, 11, 12],
            current_index: 2,
            completed_matches: 1,
            failed_matches: vec![FailureRecord {
                match_id: 11,
                message: "timed out".to_string(),
            }],
            options: JobOptions::default(),
            interval: 2000,
            config_hash: Some("abc".to_string()),
            run_id: 3,
            results_marker: ResultsMarker::default(),
        }
    }

    #[tokio::test]
    async fn test_missing_files_load_as_nothing_saved() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(store.load_checkpoint().await.unwrap().is_none());
        assert!(store.load_results().await.unwrap().is_empty());
        store.delete_checkpoint().await.unwrap();
        store.delete_results().await.unwrap();
    }

    #[tokio::test]
    async fn test_checkpoint_save_load_delete() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.save_checkpoint(&state()).await.unwrap();
        assert_eq!(store.load_checkpoint().await.unwrap(), Some(state()));
        assert!(!dir.path().join("checkpoint.json.tmp").exists());

        store.delete_checkpoint().await.unwrap();
        assert!(store.load_checkpoint().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_uses_camel_case_schema() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save_checkpoint(&state()).await.unwrap();

        let text = std::fs::read_to_string(store.checkpoint_path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["matchIds"], serde_json::json!([10, 11, 12]));
        assert_eq!(json["currentIndex"], 2);
        assert_eq!(json["completedMatches"], 1);
        assert_eq!(json["failedMatches"][0]["matchId"], 11);
        assert_eq!(json["failedMatches"][0]["error"], "timed out");
        assert_eq!(json["options"]["includeRatings"], true);
        assert_eq!(json["interval"], 2000);
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(store.checkpoint_path(), "{ not json").unwrap();

        assert!(matches!(
            store.load_checkpoint().await,
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_results_create_parent_directory() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.save_results(&[]).await.unwrap();
        assert!(store.results_path().exists());
        assert!(store.load_results().await.unwrap().is_empty());
    }
}
