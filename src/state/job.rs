//! The job value owned by the controller

use crate::config::JobConfig;
use crate::state::failures::{FailureRecord, FailureTracker};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-run options, snapshotted when a job starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    pub include_events: bool,
    pub include_timeline: bool,
    pub include_ratings: bool,
    pub use_structured_api: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            include_events: true,
            include_timeline: false,
            include_ratings: true,
            use_structured_api: false,
        }
    }
}

impl From<&JobConfig> for JobOptions {
    fn from(config: &JobConfig) -> Self {
        Self {
            include_events: config.include_events,
            include_timeline: config.include_timeline,
            include_ratings: config.include_ratings,
            use_structured_api: config.use_structured_api,
        }
    }
}

/// How the identifier sequence was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobMode {
    Range,
    #[default]
    ExplicitList,
}

/// One job: a fixed identifier sequence and the progress through it
///
/// The cursor only moves forward through [`Job::record_success`] and
/// [`Job::record_failure`], so `completed + failures == cursor` holds after
/// every step.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    mode: JobMode,
    ids: Vec<u64>,
    options: JobOptions,
    interval: Duration,
    cursor: usize,
    completed: usize,
    failures: FailureTracker,
}

impl Job {
    pub fn new(mode: JobMode, ids: Vec<u64>, options: JobOptions, interval: Duration) -> Self {
        Self {
            mode,
            ids,
            options,
            interval,
            cursor: 0,
            completed: 0,
            failures: FailureTracker::new(),
        }
    }

    /// Rebuilds a job from saved progress
    ///
    /// Returns `None` when the saved counters violate the job invariants.
    pub fn from_parts(
        mode: JobMode,
        ids: Vec<u64>,
        options: JobOptions,
        interval: Duration,
        cursor: usize,
        completed: usize,
        failures: Vec<FailureRecord>,
    ) -> Option<Self> {
        let job = Self {
            mode,
            ids,
            options,
            interval,
            cursor,
            completed,
            failures: FailureTracker::from_records(failures),
        };
        job.invariants_hold().then_some(job)
    }

    /// Moves the failed identifiers into a new explicit-list job
    ///
    /// The failures are cleared here; the sub-job records its own.
    pub fn take_retry_job(&mut self) -> Job {
        let ids = self.failures.retry_set();
        self.failures.clear();
        Job::new(JobMode::ExplicitList, ids, self.options, self.interval)
    }

    /// Moves the cursor back to an earlier consistent point
    pub fn rewind(&mut self, cursor: usize, completed: usize, failed: usize) -> bool {
        if cursor > self.cursor
            || completed > self.completed
            || failed > self.failures.len()
            || completed + failed != cursor
        {
            return false;
        }
        self.cursor = cursor;
        self.completed = completed;
        self.failures.truncate(failed);
        true
    }

    /// Identifier at the cursor, or `None` once the sequence is exhausted
    pub fn current_id(&self) -> Option<u64> {
        self.ids.get(self.cursor).copied()
    }

    pub fn record_success(&mut self) {
        self.completed += 1;
        self.cursor += 1;
    }

    pub fn record_failure(&mut self, match_id: u64, message: impl Into<String>) {
        self.failures.record(match_id, message);
        self.cursor += 1;
    }

    pub fn invariants_hold(&self) -> bool {
        self.cursor <= self.ids.len() && self.completed + self.failures.len() == self.cursor
    }

    pub fn mode(&self) -> JobMode {
        self.mode
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn failures(&self) -> &FailureTracker {
        &self.failures
    }

    pub fn total(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(ids: Vec<u64>) -> Job {
        Job::new(
            JobMode::Range,
            ids,
            JobOptions::default(),
            Duration::from_millis(2000),
        )
    }

    #[test]
    fn test_steps_keep_invariants() {
        let mut job = job(vec![1, 2, 3]);
        assert_eq!(job.current_id(), Some(1));

        job.record_success();
        assert!(job.invariants_hold());
        job.record_failure(2, "timeout");
        assert!(job.invariants_hold());
        job.record_success();
        assert!(job.invariants_hold());

        assert_eq!(job.current_id(), None);
        assert_eq!(job.completed(), 2);
        assert_eq!(job.failures().len(), 1);
    }

    #[test]
    fn test_take_retry_job_moves_failed_ids_in_order() {
        let mut job = job(vec![5, 6, 7, 8]);
        job.record_failure(5, "a");
        job.record_success();
        job.record_failure(7, "b");

        let retry = job.take_retry_job();
        assert!(job.failures().is_empty());
        assert_eq!(retry.mode(), JobMode::ExplicitList);
        assert_eq!(retry.ids(), &[5, 7]);
        assert_eq!(retry.cursor(), 0);
        assert_eq!(retry.completed(), 0);
        assert!(retry.failures().is_empty());
    }

    #[test]
    fn test_from_parts_rejects_inconsistent_counters() {
        let ids = vec![1, 2, 3];
        let options = JobOptions::default();
        let interval = Duration::from_millis(100);

        assert!(Job::from_parts(JobMode::Range, ids.clone(), options, interval, 2, 2, vec![]).is_some());
        assert!(Job::from_parts(JobMode::Range, ids.clone(), options, interval, 2, 1, vec![]).is_none());
        assert!(Job::from_parts(JobMode::Range, ids, options, interval, 4, 4, vec![]).is_none());
    }

    #[test]
    fn test_rewind() {
        let mut job = job(vec![1, 2, 3, 4]);
        job.record_success();
        job.record_failure(2, "x");
        job.record_success();

        assert!(!job.rewind(3, 3, 0));
        assert!(job.rewind(1, 1, 0));
        assert_eq!(job.cursor(), 1);
        assert!(job.failures().is_empty());
        assert!(job.invariants_hold());
    }

    #[test]
    fn test_options_serialize_camel_case() {
        let json = serde_json::to_value(JobOptions::default()).unwrap();
        assert_eq!(json["includeEvents"], true);
        assert_eq!(json["useStructuredApi"], false);
    }
}
