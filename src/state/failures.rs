//! Per-identifier failure bookkeeping

use serde::{Deserialize, Serialize};

/// One failed attempt at an identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    #[serde(rename = "matchId")]
    pub match_id: u64,

    #[serde(rename = "error")]
    pub message: String,
}

/// Records failures in the order they happen
///
/// Repeated failures of the same identifier are all kept; each attempt is
/// counted against the cursor on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureTracker {
    records: Vec<FailureRecord>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<FailureRecord>) -> Self {
        Self { records }
    }

    pub fn record(&mut self, match_id: u64, message: impl Into<String>) {
        self.records.push(FailureRecord {
            match_id,
            message: message.into(),
        });
    }

    /// Identifiers to re-drive, in the order they failed
    pub fn retry_set(&self) -> Vec<u64> {
        self.records.iter().map(|r| r.match_id).collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Drops failures recorded after the first `len`
    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_set_preserves_order_and_duplicates() {
        let mut tracker = FailureTracker::new();
        tracker.record(30, "timeout");
        tracker.record(10, "blocked");
        tracker.record(30, "timeout again");

        assert_eq!(tracker.retry_set(), vec![30, 10, 30]);
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_clear_and_truncate() {
        let mut tracker = FailureTracker::new();
        tracker.record(1, "a");
        tracker.record(2, "b");

        tracker.truncate(1);
        assert_eq!(tracker.retry_set(), vec![1]);

        tracker.clear();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_serialized_field_names() {
        let record = FailureRecord {
            match_id: 7,
            message: "no team names".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["matchId"], 7);
        assert_eq!(json["error"], "no team names");
    }
}
