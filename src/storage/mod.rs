//! Storage module for persisting job progress
//!
//! This module handles checkpointing for resumable jobs:
//! - The light progress checkpoint (identifiers, cursor, counters, failures,
//!   options, delay), rewritten after every item
//! - The full result set, rewritten every few completions and at the end
//! - Rebuilding a [`Job`] from a saved checkpoint

mod file;
mod memory;
mod traits;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use traits::{CheckpointStore, StorageError, StorageResult};

use crate::state::{FailureRecord, Job, JobMode, JobOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Schema version written into every checkpoint
pub const CHECKPOINT_VERSION: u32 = 1;

/// Job progress at the last full result write
///
/// The result set is written less often than the checkpoint, so a resumed
/// job rolls back to this point to keep records and counters consistent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsMarker {
    pub current_index: usize,
    pub completed_matches: usize,
    pub failed_matches: usize,
    pub records: usize,
}

/// The saved progress of one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub version: u32,
    #[serde(default)]
    pub mode: JobMode,
    pub match_ids: Vec<u64>,
    pub current_index: usize,
    pub completed_matches: usize,
    pub failed_matches: Vec<FailureRecord>,
    pub options: JobOptions,
    /// Inter-item delay in milliseconds
    pub interval: u64,
    #[serde(default)]
    pub config_hash: Option<String>,
    #[serde(default)]
    pub run_id: u64,
    #[serde(default)]
    pub results_marker: ResultsMarker,
}

impl PersistedState {
    pub fn from_job(
        job: &Job,
        run_id: u64,
        config_hash: Option<String>,
        results_marker: ResultsMarker,
    ) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            mode: job.mode(),
            match_ids: job.ids().to_vec(),
            current_index: job.cursor(),
            completed_matches: job.completed(),
            failed_matches: job.failures().records().to_vec(),
            options: *job.options(),
            interval: u64::try_from(job.interval().as_millis()).unwrap_or(u64::MAX),
            config_hash,
            run_id,
            results_marker,
        }
    }

    /// Rebuilds the job, or `None` if the saved counters are inconsistent
    pub fn to_job(&self) -> Option<Job> {
        Job::from_parts(
            self.mode,
            self.match_ids.clone(),
            self.options,
            Duration::from_millis(self.interval),
            self.current_index,
            self.completed_matches,
            self.failed_matches.clone(),
        )
    }

    /// True if identifiers remain unprocessed
    pub fn is_resumable(&self) -> bool {
        self.current_index < self.match_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_round_trip_through_checkpoint() {
        let mut job = Job::new(
            JobMode::Range,
            vec![1, 2, 3],
            JobOptions::default(),
            Duration::from_millis(1500),
        );
        job.record_success();
        job.record_failure(2, "blocked");

        let state = PersistedState::from_job(&job, 4, None, ResultsMarker::default());
        assert_eq!(state.interval, 1500);
        assert!(state.is_resumable());
        assert_eq!(state.to_job(), Some(job));
    }

    #[test]
    fn test_inconsistent_checkpoint_is_rejected() {
        let json = r#"{
            "version": 1,
            "matchIds": [1, 2],
            "currentIndex": 2,
            "completedMatches": 0,
            "failedMatches": [],
            "options": {"includeEvents": true, "includeTimeline": false, "includeRatings": true, "useStructuredApi": false},
            "interval": 2000
        }"#;
        let state: PersistedState = serde_json::from_str(json).unwrap();

        assert_eq!(state.mode, JobMode::ExplicitList);
        assert_eq!(state.results_marker, ResultsMarker::default());
        assert!(!state.is_resumable());
        assert!(state.to_job().is_none());
    }
}
