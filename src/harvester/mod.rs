//! Harvesting pipeline
//!
//! This module contains the job-level logic:
//! - Resolving a job request into identifiers (`enumerator`)
//! - Single-flight, rate-limited step scheduling (`scheduler`)
//! - The job state machine and its control surface (`controller`)

mod controller;
mod enumerator;
mod scheduler;

pub use controller::{ControllerSettings, JobController, JobHandle, JobProgress, ResumeOffer};
pub use enumerator::{enumerate, JobRequest, MAX_RANGE_LEN};
pub use scheduler::{StepPermit, StepScheduler};
