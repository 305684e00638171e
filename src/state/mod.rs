//! State module for tracking job progress
//!
//! # Components
//!
//! - `JobStatus`: The controller state machine (idle, running, paused, completed)
//! - `Job`: The identifier sequence, options and cursor of one job
//! - `FailureTracker`: Failed identifiers and their error messages

mod failures;
mod job;
mod status;

// Re-export main types
pub use failures::{FailureRecord, FailureTracker};
pub use job::{Job, JobMode, JobOptions};
pub use status::JobStatus;
