//! Turns a job request into its identifier sequence

use crate::state::JobMode;
use crate::ValidationError;

/// Upper bound on the identifiers one range job may enumerate
pub const MAX_RANGE_LEN: u64 = 1_000_000;

/// What the operator asked to harvest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    /// Every identifier from `start` to `end`, inclusive
    Range { start: i64, end: i64 },

    /// Identifiers separated by commas or newlines
    ExplicitList(String),
}

impl JobRequest {
    pub fn mode(&self) -> JobMode {
        match self {
            Self::Range { .. } => JobMode::Range,
            Self::ExplicitList(_) => JobMode::ExplicitList,
        }
    }
}

/// Resolves a request into an ordered identifier sequence
///
/// A range is valid when `start > 0`, `end >= start` and it spans at most
/// [`MAX_RANGE_LEN`] identifiers. A list keeps every
/// positive integer token in order, duplicates included, and silently drops
/// anything else. A list with no usable token is rejected.
pub fn enumerate(request: &JobRequest) -> Result<Vec<u64>, ValidationError> {
    match request {
        JobRequest::Range { start, end } => {
            if *start <= 0 {
                return Err(ValidationError::NonPositiveStart);
            }
            if end < start {
                return Err(ValidationError::InvalidRange {
                    start: *start,
                    end: *end,
                });
            }
            // start > 0 and end >= start, so neither the span nor the bounds overflow
            if (*end - *start) as u64 >= MAX_RANGE_LEN {
                return Err(ValidationError::RangeTooLarge {
                    start: *start,
                    end: *end,
                    max: MAX_RANGE_LEN,
                });
            }
            Ok((*start as u64..=*end as u64).collect())
        }
        JobRequest::ExplicitList(text) => {
            let ids: Vec<u64> = text
                .split(|c: char| c == ',' || c == '\n')
                .filter_map(|token| token.trim().parse::<i64>().ok())
                .filter(|id| *id > 0)
                .map(|id| id as u64)
                .collect();

            if ids.is_empty() {
                return Err(ValidationError::EmptyList);
            }
            Ok(ids)
        }
    }
}
