//! Job controller - the state machine driving a harvesting job
//!
//! The controller owns the current [`Job`] and its accumulated records. A
//! single background loop per run takes the identifier at the cursor, fetches
//! it through the [`StepScheduler`], normalizes the result and checkpoints:
//! - the light checkpoint after every item
//! - the full result set every `checkpoint_every` completions, when the loop
//!   stops on a pause, and once at completion
//!
//! Every run has an identifier. `clear`, `start` and `retry_failed` begin a new
//! run, and a fetch that resolves for an older run is discarded.

use crate::config::JobConfig;
use crate::fetch::{FetchError, FetcherSet, RawMatch};
use crate::harvester::enumerator::{enumerate, JobRequest};
use crate::harvester::scheduler::StepScheduler;
use crate::output::{export_results, ExportFormat};
use crate::record::{normalize, MatchRecord};
use crate::state::{FailureRecord, Job, JobOptions, JobStatus};
use crate::storage::{CheckpointStore, PersistedState, ResultsMarker, StorageError};
use crate::{HarvestError, ValidationError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

/// Controller-wide settings that are not part of a single job
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Inter-item delay used when a job does not specify one
    pub interval: Duration,

    /// Write the full result set every this many completions
    pub checkpoint_every: usize,

    /// Hash of the configuration, stored with each checkpoint
    pub config_hash: Option<String>,
}

impl ControllerSettings {
    pub fn from_config(config: &JobConfig, config_hash: Option<String>) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            checkpoint_every: config.checkpoint_every as usize,
            config_hash,
        }
    }
}

/// Snapshot of the controller, published after every change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub run_id: u64,
    pub status: JobStatus,
    pub cursor: usize,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// True while a processing loop is active for `run_id`
    pub running_loop: bool,
    /// Set when a systemic failure stopped the loop
    pub last_error: Option<String>,
}

/// Handle to one run of a job
pub struct JobHandle {
    run_id: u64,
    progress: watch::Receiver<JobProgress>,
}

impl JobHandle {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Latest published progress
    pub fn progress(&self) -> JobProgress {
        self.progress.borrow().clone()
    }

    /// Waits until this run's loop stops
    ///
    /// The loop stops when the job completes, is paused, is stopped by a
    /// systemic failure, or is replaced by another run.
    pub async fn wait(&mut self) -> JobProgress {
        let run_id = self.run_id;
        let stopped = self
            .progress
            .wait_for(|p| p.run_id != run_id || !p.running_loop)
            .await
            .map(|p| p.clone());
        stopped.unwrap_or_else(|_| self.progress.borrow().clone())
    }
}

/// A saved, unfinished job found at startup
///
/// Nothing is resumed until the caller passes the offer to
/// [`JobController::restore`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeOffer {
    state: PersistedState,
}

impl ResumeOffer {
    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    pub fn cursor(&self) -> usize {
        self.state.current_index
    }

    pub fn total(&self) -> usize {
        self.state.match_ids.len()
    }

    pub fn completed(&self) -> usize {
        self.state.completed_matches
    }

    pub fn failed(&self) -> usize {
        self.state.failed_matches.len()
    }

    pub fn options(&self) -> &JobOptions {
        &self.state.options
    }
}

struct ControllerState {
    status: JobStatus,
    job: Option<Job>,
    results: Vec<MatchRecord>,
    run_id: u64,
    active_loop: Option<u64>,
    marker: ResultsMarker,
    last_error: Option<String>,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            status: JobStatus::Idle,
            job: None,
            results: Vec::new(),
            run_id: 0,
            active_loop: None,
            marker: ResultsMarker::default(),
            last_error: None,
        }
    }

    fn progress(&self) -> JobProgress {
        let (cursor, total, completed, failed) = self
            .job
            .as_ref()
            .map(|job| (job.cursor(), job.total(), job.completed(), job.failures().len()))
            .unwrap_or_default();

        JobProgress {
            run_id: self.run_id,
            status: self.status,
            cursor,
            total,
            completed,
            failed,
            running_loop: self.active_loop == Some(self.run_id),
            last_error: self.last_error.clone(),
        }
    }

    fn transition(&mut self, next: JobStatus) -> crate::Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Options for a retry sub-job, if one may start now
    fn retry_options(&self) -> crate::Result<JobOptions> {
        if self.status == JobStatus::Running {
            return Err(HarvestError::InvalidTransition {
                from: JobStatus::Running,
                to: JobStatus::Running,
            });
        }
        match self.job.as_ref() {
            Some(job) if !job.failures().is_empty() => Ok(*job.options()),
            _ => Err(ValidationError::EmptyList.into()),
        }
    }

    fn require_paused(&self) -> crate::Result<()> {
        if self.status != JobStatus::Paused || self.job.is_none() {
            return Err(HarvestError::InvalidTransition {
                from: self.status,
                to: JobStatus::Running,
            });
        }
        Ok(())
    }
}

/// Writes planned under the state lock and performed after releasing it
struct CheckpointPlan {
    run_id: u64,
    /// `None` once the job completed; the checkpoint is deleted instead
    state: Option<PersistedState>,
    results: Option<(Vec<MatchRecord>, ResultsMarker)>,
}

enum Step {
    Fetch {
        match_id: u64,
        options: JobOptions,
        interval: Duration,
    },
    Stop(Option<CheckpointPlan>),
}

enum ItemOutcome {
    Record(MatchRecord),
    Failed(String),
    Systemic(String),
}

struct Applied {
    plan: Option<CheckpointPlan>,
    stop: bool,
}

struct Inner {
    fetchers: FetcherSet,
    store: Arc<dyn CheckpointStore>,
    scheduler: StepScheduler,
    settings: ControllerSettings,
    state: Mutex<ControllerState>,
    persist_lock: tokio::sync::Mutex<()>,
    progress: watch::Sender<JobProgress>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, state: &ControllerState) {
        self.progress.send_replace(state.progress());
    }

    fn is_current(&self, run_id: u64) -> bool {
        self.lock().run_id == run_id
    }

    fn is_running(&self, run_id: u64) -> bool {
        let state = self.lock();
        state.run_id == run_id && state.status == JobStatus::Running
    }

    fn plan(&self, state: &ControllerState, full: bool) -> Option<CheckpointPlan> {
        let job = state.job.as_ref()?;
        let saved = PersistedState::from_job(
            job,
            state.run_id,
            self.settings.config_hash.clone(),
            state.marker,
        );
        let results = full.then(|| {
            let marker = ResultsMarker {
                current_index: job.cursor(),
                completed_matches: job.completed(),
                failed_matches: job.failures().len(),
                records: state.results.len(),
            };
            (state.results.clone(), marker)
        });

        Some(CheckpointPlan {
            run_id: state.run_id,
            state: Some(saved),
            results,
        })
    }

    fn finish_plan(&self, state: &ControllerState) -> CheckpointPlan {
        CheckpointPlan {
            run_id: state.run_id,
            state: None,
            results: Some((state.results.clone(), ResultsMarker::default())),
        }
    }

    /// Performs a planned checkpoint unless its run was replaced
    ///
    /// Write failures are logged; the in-memory state stays authoritative.
    async fn persist(&self, plan: CheckpointPlan) {
        let _guard = self.persist_lock.lock().await;
        if !self.is_current(plan.run_id) {
            tracing::debug!("Skipping checkpoint for replaced run {}", plan.run_id);
            return;
        }

        let mut saved = plan.state;
        if let Some((records, marker)) = plan.results {
            match self.store.save_results(&records).await {
                Ok(()) => {
                    if let Some(saved) = saved.as_mut() {
                        saved.results_marker = marker;
                    }
                    let mut state = self.lock();
                    if state.run_id == plan.run_id {
                        state.marker = marker;
                    }
                }
                Err(e) => tracing::warn!("Failed to write results checkpoint: {}", e),
            }
        }

        match saved {
            Some(saved) => {
                if let Err(e) = self.store.save_checkpoint(&saved).await {
                    tracing::warn!("Failed to write checkpoint: {}", e);
                }
            }
            None => {
                if let Err(e) = self.store.delete_checkpoint().await {
                    tracing::warn!("Failed to delete checkpoint: {}", e);
                }
            }
        }
    }

    fn next_step(&self, run_id: u64) -> Step {
        let mut state = self.lock();
        if state.run_id != run_id {
            return Step::Stop(None);
        }

        if state.status != JobStatus::Running {
            let plan = (state.status == JobStatus::Paused)
                .then(|| self.plan(&state, true))
                .flatten();
            return Step::Stop(plan);
        }

        let next = state
            .job
            .as_ref()
            .map(|job| (job.current_id(), *job.options(), job.interval()));

        match next {
            Some((Some(match_id), options, interval)) => Step::Fetch {
                match_id,
                options,
                interval,
            },
            Some((None, _, _)) => {
                state.status = JobStatus::Completed;
                self.publish(&state);
                Step::Stop(Some(self.finish_plan(&state)))
            }
            None => Step::Stop(None),
        }
    }

    /// Marks the loop stopped once its final writes are done
    ///
    /// Returns false if the job was resumed in the meantime, in which case
    /// the loop keeps going.
    fn release_loop(&self, run_id: u64) -> bool {
        let mut state = self.lock();
        if state.run_id != run_id {
            return true;
        }
        if state.status == JobStatus::Running && state.job.is_some() {
            return false;
        }

        state.active_loop = None;
        self.publish(&state);
        let progress = state.progress();
        tracing::info!(
            "Job {} at {}/{} ({} completed, {} failed)",
            progress.status,
            progress.cursor,
            progress.total,
            progress.completed,
            progress.failed
        );
        true
    }

    fn apply(
        &self,
        run_id: u64,
        match_id: u64,
        outcome: Result<RawMatch, FetchError>,
    ) -> Option<Applied> {
        let outcome = match outcome {
            Ok(raw) => match normalize(&raw) {
                Ok(record) => ItemOutcome::Record(record),
                Err(e) => ItemOutcome::Failed(e.to_string()),
            },
            Err(e) if e.is_systemic() => ItemOutcome::Systemic(e.to_string()),
            Err(e) => ItemOutcome::Failed(e.to_string()),
        };

        let mut guard = self.lock();
        if guard.run_id != run_id {
            tracing::debug!("Discarding result for match {} from replaced run {}", match_id, run_id);
            return None;
        }

        let every = self.settings.checkpoint_every.max(1);
        let state = &mut *guard;
        let job = state.job.as_mut()?;
        let mut full = false;
        let mut stop = false;

        match outcome {
            ItemOutcome::Record(record) => {
                tracing::debug!("Match {} harvested", match_id);
                state.results.push(record);
                job.record_success();
                full = job.completed() % every == 0;
            }
            ItemOutcome::Failed(message) => {
                tracing::warn!("Match {} failed: {}", match_id, message);
                job.record_failure(match_id, message);
            }
            ItemOutcome::Systemic(message) => {
                tracing::error!("Stopping job at match {}: {}", match_id, message);
                if state.status == JobStatus::Running {
                    state.status = JobStatus::Paused;
                }
                state.last_error = Some(message);
                full = true;
                stop = true;
            }
        }
        debug_assert!(job.invariants_hold());

        self.publish(state);
        Some(Applied {
            plan: self.plan(state, full),
            stop,
        })
    }

    async fn run_loop(self: Arc<Self>, run_id: u64) {
        loop {
            let (match_id, options, interval) = match self.next_step(run_id) {
                Step::Fetch {
                    match_id,
                    options,
                    interval,
                } => (match_id, options, interval),
                Step::Stop(plan) => {
                    if let Some(plan) = plan {
                        self.persist(plan).await;
                    }
                    if self.release_loop(run_id) {
                        return;
                    }
                    continue;
                }
            };

            let permit = self.scheduler.acquire(interval).await;
            if !self.is_running(run_id) {
                continue;
            }

            tracing::debug!("Fetching match {}", match_id);
            let outcome = self.fetchers.select(&options).fetch(match_id, &options).await;
            drop(permit);

            let Some(applied) = self.apply(run_id, match_id, outcome) else {
                return;
            };
            if let Some(plan) = applied.plan {
                self.persist(plan).await;
            }
            if applied.stop && self.release_loop(run_id) {
                return;
            }
        }
    }
}

/// Cloneable handle to the controller
#[derive(Clone)]
pub struct JobController {
    inner: Arc<Inner>,
}

impl JobController {
    /// Creates a new controller
    ///
    /// # Arguments
    ///
    /// * `fetchers` - Both acquisition strategies
    /// * `store` - Where checkpoints and results are persisted
    /// * `settings` - Default delay, checkpoint cadence and config hash
    pub fn new(
        fetchers: FetcherSet,
        store: Arc<dyn CheckpointStore>,
        settings: ControllerSettings,
    ) -> Self {
        let state = ControllerState::new();
        let (progress, _) = watch::channel(state.progress());

        Self {
            inner: Arc::new(Inner {
                fetchers,
                store,
                scheduler: StepScheduler::new(),
                settings,
                state: Mutex::new(state),
                persist_lock: tokio::sync::Mutex::new(()),
                progress,
            }),
        }
    }

    /// Starts a new job, replacing any previous one
    ///
    /// # Arguments
    ///
    /// * `request` - Range or explicit identifier list
    /// * `options` - Per-run options, including the strategy
    /// * `interval` - Inter-item delay, or `None` for the configured default
    ///
    /// # Returns
    ///
    /// * `Ok(JobHandle)` - The job is running
    /// * `Err(HarvestError::Validation)` - The request is malformed; nothing started
    /// * `Err(HarvestError::Acquisition)` - The strategy cannot run at all
    pub async fn start(
        &self,
        request: JobRequest,
        options: JobOptions,
        interval: Option<Duration>,
    ) -> crate::Result<JobHandle> {
        let ids = enumerate(&request)?;
        self.inner.fetchers.select(&options).preflight().await?;

        let job = Job::new(
            request.mode(),
            ids,
            options,
            interval.unwrap_or(self.inner.settings.interval),
        );
        tracing::info!(
            "Starting {:?} job over {} identifiers using {}",
            job.mode(),
            job.total(),
            self.inner.fetchers.select(&options).strategy()
        );

        self.begin(job, Vec::new()).await
    }

    /// Stops scheduling after the item in flight
    pub fn pause(&self) -> crate::Result<()> {
        let mut state = self.inner.lock();
        state.transition(JobStatus::Paused)?;
        self.inner.publish(&state);
        tracing::info!("Pause requested");
        Ok(())
    }

    /// Continues a paused job from its cursor
    pub async fn resume(&self) -> crate::Result<JobHandle> {
        let options = {
            let state = self.inner.lock();
            state.require_paused()?;
            state.job.as_ref().map(|job| *job.options()).unwrap_or_default()
        };
        self.inner.fetchers.select(&options).preflight().await?;

        let (run_id, spawn) = {
            let mut state = self.inner.lock();
            state.require_paused()?;
            state.transition(JobStatus::Running)?;
            state.last_error = None;
            let run_id = state.run_id;
            let spawn = state.active_loop != Some(run_id);
            state.active_loop = Some(run_id);
            self.inner.publish(&state);
            (run_id, spawn)
        };

        tracing::info!("Resuming job");
        let handle = self.handle(run_id);
        if spawn {
            self.spawn_loop(run_id);
        }
        Ok(handle)
    }

    /// Returns to Idle, discarding the job, its results and its checkpoint
    ///
    /// A fetch still in flight is not cancelled; its result is dropped when
    /// it resolves.
    pub async fn clear(&self) {
        {
            let mut state = self.inner.lock();
            state.run_id += 1;
            state.status = JobStatus::Idle;
            state.job = None;
            state.results.clear();
            state.marker = ResultsMarker::default();
            state.active_loop = None;
            state.last_error = None;
            self.inner.publish(&state);
        }

        let _guard = self.inner.persist_lock.lock().await;
        if let Err(e) = self.inner.store.delete_checkpoint().await {
            tracing::warn!("Failed to delete checkpoint: {}", e);
        }
        if let Err(e) = self.inner.store.delete_results().await {
            tracing::warn!("Failed to delete results: {}", e);
        }
        tracing::info!("Job cleared");
    }

    /// Starts a sub-job over exactly the failed identifiers
    ///
    /// Successful records from earlier runs are kept.
    pub async fn retry_failed(&self) -> crate::Result<JobHandle> {
        let options = self.inner.lock().retry_options()?;
        self.inner.fetchers.select(&options).preflight().await?;

        let (run_id, plan) = {
            let mut state = self.inner.lock();
            state.retry_options()?;
            let results = state.results.clone();
            let retry = state
                .job
                .as_mut()
                .ok_or(ValidationError::EmptyList)?
                .take_retry_job();
            tracing::info!("Retrying {} failed identifiers", retry.total());
            self.install(&mut state, retry, results)?
        };
        self.launch(run_id, plan).await
    }

    /// Reads any saved job and offers it for resumption
    pub async fn load_on_startup(&self) -> crate::Result<Option<ResumeOffer>> {
        let saved = self.inner.store.load_checkpoint().await?;
        Ok(saved
            .filter(PersistedState::is_resumable)
            .map(|state| ResumeOffer { state }))
    }

    /// Loads an offered job in the Paused state
    ///
    /// Progress rolls back to the last full result write so the records and
    /// counters agree. Call [`JobController::resume`] to continue.
    pub async fn restore(&self, offer: ResumeOffer) -> crate::Result<JobProgress> {
        let saved = offer.state;
        let mut job = saved.to_job().ok_or_else(|| StorageError::Corrupt {
            path: "checkpoint".to_string(),
            message: "counters are inconsistent with the identifier list".to_string(),
        })?;

        if let (Some(saved_hash), Some(current)) =
            (&saved.config_hash, &self.inner.settings.config_hash)
        {
            if saved_hash != current {
                tracing::warn!("Checkpoint was written with a different configuration");
            }
        }

        let mut results = self.inner.store.load_results().await?;
        let mut marker = saved.results_marker;
        if results.len() < marker.records
            || !job.rewind(
                marker.current_index,
                marker.completed_matches,
                marker.failed_matches,
            )
        {
            tracing::warn!(
                "Saved results do not match the checkpoint; restarting from the first identifier"
            );
            results.clear();
            job.rewind(0, 0, 0);
            marker = ResultsMarker::default();
        } else {
            results.truncate(marker.records);
        }

        let mut state = self.inner.lock();
        if state.status == JobStatus::Running {
            return Err(HarvestError::InvalidTransition {
                from: JobStatus::Running,
                to: JobStatus::Paused,
            });
        }

        tracing::info!(
            "Restored job at {}/{} ({} records)",
            job.cursor(),
            job.total(),
            results.len()
        );
        state.run_id = state.run_id.max(saved.run_id) + 1;
        state.status = JobStatus::Paused;
        state.job = Some(job);
        state.results = results;
        state.marker = marker;
        state.active_loop = None;
        state.last_error = None;
        self.inner.publish(&state);
        Ok(state.progress())
    }

    /// Encodes the accumulated records
    pub fn export(&self, format: ExportFormat) -> crate::Result<Vec<u8>> {
        let results = self.results();
        Ok(export_results(&results, format)?)
    }

    pub fn status(&self) -> JobStatus {
        self.inner.lock().status
    }

    pub fn progress(&self) -> JobProgress {
        self.inner.lock().progress()
    }

    /// Receives every published progress snapshot
    pub fn subscribe(&self) -> watch::Receiver<JobProgress> {
        self.inner.progress.subscribe()
    }

    pub fn results(&self) -> Vec<MatchRecord> {
        self.inner.lock().results.clone()
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        self.inner
            .lock()
            .job
            .as_ref()
            .map(|job| job.failures().records().to_vec())
            .unwrap_or_default()
    }

    async fn begin(&self, job: Job, results: Vec<MatchRecord>) -> crate::Result<JobHandle> {
        let (run_id, plan) = {
            let mut state = self.inner.lock();
            self.install(&mut state, job, results)?
        };
        self.launch(run_id, plan).await
    }

    /// Replaces any previous job, whatever its status, and marks it running
    fn install(
        &self,
        state: &mut ControllerState,
        job: Job,
        results: Vec<MatchRecord>,
    ) -> crate::Result<(u64, Option<CheckpointPlan>)> {
        state.transition(JobStatus::Idle)?;
        state.transition(JobStatus::Running)?;
        state.run_id += 1;
        state.marker = ResultsMarker {
            records: results.len(),
            ..ResultsMarker::default()
        };
        state.job = Some(job);
        state.results = results;
        state.active_loop = Some(state.run_id);
        state.last_error = None;
        self.inner.publish(state);
        Ok((state.run_id, self.inner.plan(state, true)))
    }

    async fn launch(&self, run_id: u64, plan: Option<CheckpointPlan>) -> crate::Result<JobHandle> {
        if let Some(plan) = plan {
            self.inner.persist(plan).await;
        }

        let handle = self.handle(run_id);
        self.spawn_loop(run_id);
        Ok(handle)
    }

    fn handle(&self, run_id: u64) -> JobHandle {
        JobHandle {
            run_id,
            progress: self.inner.progress.subscribe(),
        }
    }

    fn spawn_loop(&self, run_id: u64) {
        tokio::spawn(Arc::clone(&self.inner).run_loop(run_id));
    }
}
