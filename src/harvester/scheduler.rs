//! Step scheduler enforcing single-flight fetching with a minimum gap
//!
//! This module handles:
//! - Allowing at most one fetch in flight through a one-permit semaphore
//! - Spacing the start of a fetch at least the job's interval after the
//!   completion of the previous one

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Permission to run one fetch
///
/// Dropping the permit records the completion time that the next
/// [`StepScheduler::acquire`] measures its gap from.
pub struct StepPermit {
    last_completion: Arc<Mutex<Option<Instant>>>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for StepPermit {
    fn drop(&mut self) {
        *self
            .last_completion
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }
}

/// Scheduler shared by every run of one controller
///
/// A fetch left in flight by a cleared run still holds the permit, so a new
/// run cannot overlap it.
#[derive(Clone)]
pub struct StepScheduler {
    semaphore: Arc<Semaphore>,
    last_completion: Arc<Mutex<Option<Instant>>>,
}

impl StepScheduler {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            last_completion: Arc::new(Mutex::new(None)),
        }
    }

    /// Time left before a step may start, given the minimum gap
    pub fn time_until_ready(&self, min_gap: Duration, now: Instant) -> Duration {
        let last = *self
            .last_completion
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match last {
            Some(last) => (last + min_gap).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Waits until no fetch is in flight and the gap has elapsed
    ///
    /// # Arguments
    ///
    /// * `min_gap` - Minimum time between the previous completion and this start
    ///
    /// # Returns
    ///
    /// The permit for the next fetch
    pub async fn acquire(&self, min_gap: Duration) -> StepPermit {
        let permit = loop {
            // The semaphore is never closed
            if let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await {
                break permit;
            }
        };

        let wait = self.time_until_ready(min_gap, Instant::now());
        if !wait.is_zero() {
            tracing::trace!("Waiting {:?} before next step", wait);
            tokio::time::sleep(wait).await;
        }

        StepPermit {
            last_completion: Arc::clone(&self.last_completion),
            _permit: permit,
        }
    }
}

impl Default for StepScheduler {
    fn default() -> Self {
        Self::new()
    }
}
