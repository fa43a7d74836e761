use crate::checker::{PollExecutor, PollOutcome};
use crate::core::clock::Clock;
use crate::core::error::{PollError, Result};
use crate::core::models::{JobContext, JobStatus, JobType, PollingJob};
use crate::core::notifications::{Snackbar, SnackbarKind};
use crate::core::retry::{RetryDecision, RetryPolicy};
use crate::core::store::JobStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

struct Shared {
    executor: PollExecutor,
    jobs: JobStore,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    snackbar: Snackbar,
}

#[derive(Default)]
struct Slot {
    job: Option<PollingJob>,
    timer: Option<JoinHandle<()>>,
    /// Bumped whenever the slot's job is replaced or stopped; ticks from older timers are dropped.
    generation: u64,
}

impl Slot {
    fn cancel_timer(&mut self) -> bool {
        self.generation += 1;
        match self.timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
struct ServiceInner {
    slots: HashMap<JobType, Slot>,
}

impl ServiceInner {
    fn slot_mut(&mut self, job_type: JobType) -> &mut Slot {
        self.slots.entry(job_type).or_default()
    }

    fn live_slot_mut(&mut self, job_type: JobType, generation: u64) -> Option<&mut Slot> {
        self.slots
            .get_mut(&job_type)
            .filter(|slot| slot.generation == generation)
    }
}

/// Owns one timer per job type and drives each job to a terminal state.
pub struct PollingService {
    inner: Arc<Mutex<ServiceInner>>,
    shared: Arc<Shared>,
}

impl PollingService {
    pub fn new(
        executor: PollExecutor,
        jobs: JobStore,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
        snackbar: Snackbar,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ServiceInner::default())),
            shared: Arc::new(Shared {
                executor,
                jobs,
                policy,
                clock,
                snackbar,
            }),
        }
    }

    pub async fn start_report_polling(&self, context: JobContext) -> Result<PollingJob> {
        self.start_polling(JobType::Report, context).await
    }

    pub async fn start_task_polling(&self, context: JobContext) -> Result<PollingJob> {
        self.start_polling(JobType::Task, context).await
    }

    /// Registers a fresh job for `job_type`, replacing any job of the same type.
    pub async fn start_polling(&self, job_type: JobType, context: JobContext) -> Result<PollingJob> {
        let job_id = PollingJob::id_from_context(job_type, &context).ok_or(
            PollError::InvalidContext {
                job_type,
                field: job_type.id_field(),
            },
        )?;
        let job = PollingJob::new(job_type, job_id, context, self.shared.clock.now());

        let mut inner = self.inner.lock().await;
        let slot = inner.slot_mut(job_type);

        if slot.cancel_timer() {
            tracing::info!(
                %job_type,
                previous = slot.job.as_ref().map(|j| j.job_id.as_str()).unwrap_or_default(),
                job_id = %job.job_id,
                "Replacing active polling job"
            );
        }

        if let Err(e) = self.shared.jobs.save(&job) {
            tracing::warn!(%job_type, job_id = %job.job_id, error = %e, "Failed to persist new job");
        }

        slot.job = Some(job.clone());
        slot.timer = Some(self.spawn_timer(job_type, slot.generation));

        tracing::info!(
            %job_type,
            job_id = %job.job_id,
            interval_secs = self.shared.policy.interval().as_secs(),
            max_retries = self.shared.policy.max_retries(),
            "Started polling"
        );

        Ok(job)
    }

    /// Cancels the timer for `job_type` and marks its job stopped. Returns whether a timer was live.
    pub async fn stop_polling(&self, job_type: JobType) -> bool {
        let mut inner = self.inner.lock().await;
        let slot = inner.slot_mut(job_type);
        let had_timer = slot.cancel_timer();

        if let Some(job) = slot.job.as_mut() {
            if job.status.is_resumable() {
                job.status = JobStatus::Stopped;
            }
        }

        if let Err(e) = self.shared.jobs.clear(job_type) {
            tracing::warn!(%job_type, error = %e, "Failed to clear persisted job");
        }

        if had_timer {
            tracing::info!(%job_type, "Stopped polling");
        }
        had_timer
    }

    pub async fn stop_all_polling(&self) {
        for job_type in JobType::ALL {
            self.stop_polling(job_type).await;
        }
    }

    /// Restarts timers for unfinished jobs found in storage, keeping their retry counts.
    pub async fn resume_polling(&self) -> Vec<JobType> {
        let mut resumed = Vec::new();

        for job_type in JobType::ALL {
            let job = match self.shared.jobs.load(job_type) {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(%job_type, error = %e, "Failed to read persisted job");
                    continue;
                }
            };

            if !job.status.is_resumable() {
                tracing::debug!(%job_type, status = %job.status, "Clearing finished persisted job");
                if let Err(e) = self.shared.jobs.clear(job_type) {
                    tracing::warn!(%job_type, error = %e, "Failed to clear persisted job");
                }
                continue;
            }

            let mut inner = self.inner.lock().await;
            let slot = inner.slot_mut(job_type);
            if slot.timer.is_some() {
                tracing::debug!(%job_type, "Already polling, not resuming persisted job");
                continue;
            }

            tracing::info!(
                %job_type,
                job_id = %job.job_id,
                retry_count = job.retry_count,
                "Resuming polling"
            );

            slot.generation += 1;
            slot.job = Some(job);
            slot.timer = Some(self.spawn_timer(job_type, slot.generation));
            resumed.push(job_type);
        }

        resumed
    }

    pub async fn get_polling_state(&self, job_type: JobType) -> Option<PollingJob> {
        self.inner
            .lock()
            .await
            .slots
            .get(&job_type)
            .and_then(|slot| slot.job.clone())
    }

    pub async fn is_polling(&self, job_type: JobType) -> bool {
        self.inner.lock().await.slots.get(&job_type).is_some_and(|slot| {
            slot.timer.is_some() && slot.job.as_ref().is_some_and(|j| j.status.is_resumable())
        })
    }

    /// Halts all timers but leaves persisted state in place for the next `resume_polling`.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        for (job_type, slot) in inner.slots.iter_mut() {
            if slot.cancel_timer() {
                tracing::debug!(%job_type, "Suspended polling timer");
            }
        }
    }

    fn spawn_timer(&self, job_type: JobType, generation: u64) -> JoinHandle<()> {
        tokio::spawn(run_timer(
            Arc::clone(&self.inner),
            Arc::clone(&self.shared),
            job_type,
            generation,
        ))
    }
}

async fn run_timer(
    inner: Arc<Mutex<ServiceInner>>,
    shared: Arc<Shared>,
    job_type: JobType,
    generation: u64,
) {
    loop {
        let job = {
            let mut guard = inner.lock().await;
            match guard
                .live_slot_mut(job_type, generation)
                .and_then(|slot| slot.job.clone())
            {
                Some(job) => job,
                None => return,
            }
        };

        shared
            .clock
            .sleep(shared.policy.next_delay(job.retry_count))
            .await;

        let outcome = shared.executor.poll(&job).await;

        let mut guard = inner.lock().await;
        let Some(slot) = guard.live_slot_mut(job_type, generation) else {
            tracing::debug!(%job_type, job_id = %job.job_id, "Discarding tick from replaced job");
            return;
        };
        let Some(current) = slot.job.as_mut() else {
            return;
        };

        let finished = apply_outcome(current, outcome, &shared);

        match finished {
            Some((kind, message)) => {
                if let Err(e) = shared.jobs.clear(job_type) {
                    tracing::warn!(%job_type, error = %e, "Failed to clear persisted job");
                }
                slot.timer = None;
                drop(guard);

                shared.snackbar.show(message, kind);
                return;
            }
            None => {
                if let Err(e) = shared.jobs.save(current) {
                    tracing::warn!(%job_type, error = %e, "Failed to persist polling state");
                }
            }
        }
    }
}

/// Folds one poll outcome into the job. Returns the notification to surface when the job finished.
fn apply_outcome(
    job: &mut PollingJob,
    outcome: PollOutcome,
    shared: &Shared,
) -> Option<(SnackbarKind, String)> {
    job.last_polled_at = Some(shared.clock.now());
    let label = job.job_type.label();

    match outcome {
        PollOutcome::Completed(payload) => {
            job.status = JobStatus::Succeeded;
            tracing::info!(job_type = %job.job_type, job_id = %job.job_id, "Job succeeded");
            let message = match payload.result_url {
                Some(url) => format!("{} {} is ready: {}", label, job.job_id, url),
                None => format!("{} {} is ready", label, job.job_id),
            };
            Some((SnackbarKind::Success, message))
        }
        PollOutcome::InProgress(_) => {
            job.status = JobStatus::Active;
            None
        }
        PollOutcome::Rejected(payload) => {
            job.status = JobStatus::Failed;
            tracing::warn!(
                job_type = %job.job_type,
                job_id = %job.job_id,
                reason = payload.message.as_deref().unwrap_or("unspecified"),
                "Job reported failed by server"
            );
            let message = match payload.message {
                Some(reason) => format!("{} {} failed: {}", label, job.job_id, reason),
                None => format!("{} {} failed", label, job.job_id),
            };
            Some((SnackbarKind::Error, message))
        }
        PollOutcome::Error(e) => {
            job.retry_count = job.retry_count.saturating_add(1);
            match shared.policy.decide(job.retry_count) {
                RetryDecision::GiveUp => {
                    job.status = JobStatus::Failed;
                    tracing::warn!(
                        job_type = %job.job_type,
                        job_id = %job.job_id,
                        retry_count = job.retry_count,
                        error = %e,
                        "Giving up on job after repeated failures"
                    );
                    Some((
                        SnackbarKind::Error,
                        format!(
                            "{} {} failed after {} attempts",
                            label, job.job_id, job.retry_count
                        ),
                    ))
                }
                RetryDecision::RetryAfter(delay) => {
                    job.status = JobStatus::Active;
                    tracing::info!(
                        job_type = %job.job_type,
                        job_id = %job.job_id,
                        retry_count = job.retry_count,
                        next_retry_secs = delay.as_secs(),
                        "Status check failed, backing off"
                    );
                    None
                }
            }
        }
    }
}
