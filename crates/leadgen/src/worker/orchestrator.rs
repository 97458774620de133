//! Job orchestration: status transitions, retries, cancellation and the
//! polling loop that keeps up to `max_concurrent_jobs` jobs running.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broadcast::job_progress::JobStage;
use crate::broadcast::JobProgressBroadcaster;
use crate::config::Config;
use crate::error::{LeadgenError, Result};
use crate::model::{Job, JobStatus};
use crate::pipeline::{
    BroadcastProgress, Pipeline, PipelineContext, PipelineError, ProgressEvent, ProgressReporter,
};
use crate::store::{JobQuery, JobStore, Transition};
use crate::webhook::{WebhookNotifier, WebhookPayload};

use super::registry::{ActiveJobGuard, ActiveJobs};
use super::retry::RetryPolicy;

pub const PROGRESS_STARTED: u8 = 10;

const ORPHAN_MESSAGE: &str = "Job was interrupted before completion";

/// How a `process_job` call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { results_count: u32 },
    Failed { error: String },
    Cancelled,
    /// The job was not run; it is in the given status.
    Skipped(JobStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub active_jobs: usize,
    pub max_concurrent_jobs: usize,
}

/// Orchestrator tunables.
#[derive(Clone)]
pub struct OrchestratorSettings {
    pub max_concurrent_jobs: usize,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    pub notifier: Option<WebhookNotifier>,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent_jobs: config.orchestrator.max_concurrent_jobs,
            poll_interval: config.orchestrator.poll_interval(),
            retry: RetryPolicy::from_config(&config.retry),
            notifier: Some(WebhookNotifier::from_config(&config.webhook)),
        }
    }
}

struct Inner {
    store: Arc<dyn JobStore>,
    pipeline: Pipeline,
    broadcaster: JobProgressBroadcaster,
    active: Arc<ActiveJobs>,
    permits: Arc<Semaphore>,
    settings: OrchestratorSettings,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        pipeline: Pipeline,
        broadcaster: JobProgressBroadcaster,
        settings: OrchestratorSettings,
    ) -> Self {
        let limit = settings.max_concurrent_jobs.max(1);
        Self {
            inner: Arc::new(Inner {
                store,
                pipeline,
                broadcaster,
                active: Arc::new(ActiveJobs::new()),
                permits: Arc::new(Semaphore::new(limit)),
                settings,
            }),
        }
    }

    pub fn broadcaster(&self) -> &JobProgressBroadcaster {
        &self.inner.broadcaster
    }

    pub fn active_job_ids(&self) -> Vec<String> {
        self.inner.active.ids()
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            active_jobs: self.inner.active.len(),
            max_concurrent_jobs: self.inner.settings.max_concurrent_jobs,
        }
    }

    /// Runs one queued job to a terminal state, waiting for a free slot
    /// first. Returns `AlreadyActive` if another call is running the same id.
    pub async fn process_job(&self, job_id: &str) -> Result<JobOutcome> {
        let guard = self
            .inner
            .active
            .try_register(job_id)
            .ok_or_else(|| LeadgenError::AlreadyActive(job_id.to_string()))?;

        let permit = match Arc::clone(&self.inner.permits).acquire_owned().await {
            Ok(permit) => permit,
            // Closed on shutdown: the job stays queued.
            Err(_) => return Ok(JobOutcome::Skipped(JobStatus::Queued)),
        };

        self.execute(guard, permit).await
    }

    async fn execute(&self, guard: ActiveJobGuard, _permit: OwnedSemaphorePermit) -> Result<JobOutcome> {
        let inner = &self.inner;
        let job_id = guard.job_id().to_string();

        let job = inner
            .store
            .get_job(&job_id)?
            .ok_or_else(|| LeadgenError::NotFound(job_id.clone()))?;
        if job.status != JobStatus::Queued {
            debug!(job_id = %job_id, status = %job.status, "Job is not queued, skipping");
            return Ok(JobOutcome::Skipped(job.status));
        }

        let started = inner.store.transition(
            &job_id,
            &JobStatus::sources_of(JobStatus::Processing),
            JobStatus::Processing,
            &Transition {
                progress: Some(PROGRESS_STARTED),
                set_started: true,
                ..Transition::default()
            },
        )?;
        if !started {
            let status = inner
                .store
                .get_job(&job_id)?
                .map(|j| j.status)
                .unwrap_or(JobStatus::Cancelled);
            debug!(job_id = %job_id, status = %status, "Lost the race to start job");
            return Ok(JobOutcome::Skipped(status));
        }

        let tracker = inner.broadcaster.tracker(&job_id);
        tracker.update_stage(JobStage::Starting, PROGRESS_STARTED, "Job started");
        info!(job_id = %job_id, "Job started");

        let reporter = BroadcastProgress::new(tracker);
        let cancel = guard.token().clone();

        // From here on the job is Processing: any error must end in Failed.
        let outcome = match self.drive(&job_id, &reporter, &cancel).await {
            Ok(outcome) => outcome,
            Err(e) => self.fail_after_error(&job_id, &reporter, e)?,
        };
        match &outcome {
            JobOutcome::Completed { results_count } => {
                info!(job_id = %job_id, results = results_count, "Job completed");
                self.after_terminal(&job_id).await;
            }
            JobOutcome::Failed { error } => {
                error!(job_id = %job_id, error = %error, "Job failed");
                self.after_terminal(&job_id).await;
            }
            JobOutcome::Cancelled => info!(job_id = %job_id, "Job cancelled, attempt stopped"),
            JobOutcome::Skipped(_) => {}
        }
        Ok(outcome)
    }

    async fn drive(
        &self,
        job_id: &str,
        reporter: &BroadcastProgress,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome> {
        let job = self
            .inner
            .store
            .get_job(job_id)?
            .ok_or_else(|| LeadgenError::NotFound(job_id.to_string()))?;
        self.attempt_loop(job, reporter, cancel).await
    }

    /// Best-effort Processing -> Failed after an error outside the attempt
    /// loop's own handling. Returns the original error only if the job could
    /// not be marked failed either.
    fn fail_after_error(
        &self,
        job_id: &str,
        reporter: &BroadcastProgress,
        cause: LeadgenError,
    ) -> Result<JobOutcome> {
        let message = cause.to_string();
        match self.mark_failed(job_id, &message) {
            Ok(true) => {
                reporter.report(ProgressEvent::Failed {
                    progress: self.current_progress(job_id),
                    error: message.clone(),
                });
                Ok(JobOutcome::Failed { error: message })
            }
            Ok(false) => Ok(JobOutcome::Cancelled),
            Err(e) => {
                error!(job_id = %job_id, error = %e, cause = %message, "Could not mark job failed");
                Err(cause)
            }
        }
    }

    fn current_progress(&self, job_id: &str) -> u8 {
        match self.inner.store.get_job(job_id) {
            Ok(Some(job)) => job.progress,
            _ => 0,
        }
    }

    fn mark_failed(&self, job_id: &str, message: &str) -> Result<bool> {
        Ok(self.inner.store.transition(
            job_id,
            &JobStatus::sources_of(JobStatus::Failed),
            JobStatus::Failed,
            &Transition {
                error_message: Some(message.to_string()),
                set_completed: true,
                ..Transition::default()
            },
        )?)
    }

    /// Runs attempts until one succeeds, fails for good, or the job leaves
    /// Processing. Store errors while recording a retry or committing the
    /// completion count as failed attempts.
    async fn attempt_loop(
        &self,
        job: Job,
        reporter: &BroadcastProgress,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome> {
        let inner = &self.inner;
        let retry = &inner.settings.retry;
        let mut ctx = PipelineContext::new(job);
        let mut result = self.attempt(&mut ctx, reporter, cancel).await;

        loop {
            let err = match result {
                Ok(results_count) => return Ok(JobOutcome::Completed { results_count }),
                Err(PipelineError::Cancelled) => return Ok(JobOutcome::Cancelled),
                Err(e) => e,
            };
            if !(err.is_retryable() && retry.should_retry(ctx.job.retry_count)) {
                return self.finish_failed(&ctx, reporter, &err.to_string());
            }

            let attempt = ctx.job.retry_count + 1;
            let message = err.to_string();
            warn!(
                job_id = %ctx.job.id,
                attempt,
                max_retries = retry.max_retries,
                error = %message,
                "Attempt failed, retrying"
            );
            let mut next = ctx.next_attempt();
            next.job.retry_count = attempt;
            ctx = next;

            result = match inner.store.record_retry(&ctx.job.id, &message) {
                Ok(false) => return Ok(JobOutcome::Cancelled),
                Err(e) => Err(PipelineError::from(e)),
                Ok(true) => {
                    reporter.report(ProgressEvent::Retrying {
                        progress: ctx.progress,
                        attempt,
                        error: message,
                    });
                    if !retry.wait(attempt, cancel).await {
                        return Ok(JobOutcome::Cancelled);
                    }
                    self.attempt(&mut ctx, reporter, cancel).await
                }
            };
        }
    }

    /// One pipeline run followed by the Completed transition.
    async fn attempt(
        &self,
        ctx: &mut PipelineContext,
        reporter: &BroadcastProgress,
        cancel: &CancellationToken,
    ) -> std::result::Result<u32, PipelineError> {
        let results_count = self.inner.pipeline.run(ctx, reporter, cancel).await?;
        let applied = self.inner.store.transition(
            &ctx.job.id,
            &JobStatus::sources_of(JobStatus::Completed),
            JobStatus::Completed,
            &Transition {
                progress: Some(100),
                set_completed: true,
                ..Transition::default()
            },
        )?;
        if !applied {
            return Err(PipelineError::Cancelled);
        }
        reporter.report(ProgressEvent::Completed { results_count });
        Ok(results_count)
    }

    fn finish_failed(
        &self,
        ctx: &PipelineContext,
        reporter: &BroadcastProgress,
        message: &str,
    ) -> Result<JobOutcome> {
        if !self.mark_failed(&ctx.job.id, message)? {
            return Ok(JobOutcome::Cancelled);
        }
        reporter.report(ProgressEvent::Failed {
            progress: ctx.progress,
            error: message.to_string(),
        });
        Ok(JobOutcome::Failed {
            error: message.to_string(),
        })
    }

    /// Daily statistics and webhook for a Completed or Failed job. Errors
    /// here are logged; the job's outcome is already committed.
    async fn after_terminal(&self, job_id: &str) {
        let inner = &self.inner;
        let job = match inner.store.get_job(job_id) {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Could not reload finished job");
                return;
            }
        };

        let finished_at = job.completed_at.unwrap_or(job.updated_at);
        let date = finished_at.format("%Y-%m-%d").to_string();
        let succeeded = job.status == JobStatus::Completed;
        if let Err(e) = inner.store.record_daily_stats(
            &date,
            succeeded,
            job.results_count,
            job.duration_ms().unwrap_or(0),
        ) {
            warn!(job_id = %job_id, error = %e, "Failed to record daily statistics");
        }

        if let (Some(url), Some(notifier)) = (&job.params.webhook_url, &inner.settings.notifier) {
            if let Some(payload) = WebhookPayload::for_job(&job) {
                notifier.notify(url, &payload).await;
            }
        }
    }

    /// Cancels a Queued or Processing job and interrupts its running attempt.
    pub fn cancel_job(&self, job_id: &str) -> Result<Job> {
        let inner = &self.inner;
        loop {
            let applied = inner.store.transition(
                job_id,
                &JobStatus::sources_of(JobStatus::Cancelled),
                JobStatus::Cancelled,
                &Transition {
                    set_completed: true,
                    ..Transition::default()
                },
            )?;
            if applied {
                break;
            }
            match inner.store.get_job(job_id)? {
                None => return Err(LeadgenError::NotFound(job_id.to_string())),
                Some(job) if job.is_terminal() => {
                    return Err(LeadgenError::AlreadyTerminal {
                        id: job_id.to_string(),
                        status: job.status,
                    })
                }
                // Moved from Queued to Processing in between; try again.
                Some(_) => continue,
            }
        }

        if inner.active.cancel(job_id) {
            debug!(job_id = %job_id, "Signalled running attempt");
        }
        let job = inner
            .store
            .get_job(job_id)?
            .ok_or_else(|| LeadgenError::NotFound(job_id.to_string()))?;
        BroadcastProgress::new(inner.broadcaster.tracker(job_id)).report(ProgressEvent::Cancelled {
            progress: job.progress,
        });
        info!(job_id = %job_id, "Job cancelled");
        Ok(job)
    }

    /// Fails Processing jobs with no attempt in this process. Returns how
    /// many were failed.
    pub fn recover_orphans(&self) -> Result<usize> {
        let inner = &self.inner;
        let mut orphans = Vec::new();
        let mut offset = 0;
        loop {
            let page = inner.store.list_jobs(&JobQuery {
                status: Some(JobStatus::Processing),
                offset,
                limit: 100,
            })?;
            if page.jobs.is_empty() {
                break;
            }
            offset += page.jobs.len() as u64;
            orphans.extend(
                page.jobs
                    .into_iter()
                    .filter(|job| !inner.active.contains(&job.id))
                    .map(|job| job.id),
            );
            if offset >= page.total {
                break;
            }
        }

        let mut failed = 0;
        for id in orphans {
            if self.mark_failed(&id, ORPHAN_MESSAGE)? {
                warn!(job_id = %id, "Failed orphaned processing job");
                failed += 1;
            }
        }
        Ok(failed)
    }

    /// Polls for queued jobs and runs them until `shutdown` fires, then waits
    /// for running jobs to finish.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let recovered = self.recover_orphans()?;
        if recovered > 0 {
            warn!(count = recovered, "Recovered orphaned jobs");
        }

        let inner = &self.inner;
        info!(
            max_concurrent_jobs = inner.settings.max_concurrent_jobs,
            poll_interval_ms = inner.settings.poll_interval.as_millis() as u64,
            "Orchestrator started"
        );

        let mut tasks: JoinSet<()> = JoinSet::new();
        loop {
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!(error = %e, "Job task panicked");
                }
            }

            let free = inner.permits.available_permits();
            if free > 0 {
                match inner.store.queued_job_ids(free) {
                    Ok(ids) => self.spawn_queued(ids, &mut tasks),
                    Err(e) => warn!(error = %e, "Failed to poll queued jobs"),
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(inner.settings.poll_interval) => {}
            }
        }

        info!(running = tasks.len(), "Orchestrator shutting down");
        inner.permits.close();
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Job task panicked");
            }
        }
        info!("Orchestrator stopped");
        Ok(())
    }

    fn spawn_queued(&self, ids: Vec<String>, tasks: &mut JoinSet<()>) {
        for id in ids {
            let Some(guard) = self.inner.active.try_register(&id) else {
                continue;
            };
            let Ok(permit) = Arc::clone(&self.inner.permits).try_acquire_owned() else {
                break;
            };
            let this = self.clone();
            tasks.spawn(async move {
                match this.execute(guard, permit).await {
                    Ok(outcome) => debug!(job_id = %id, outcome = ?outcome, "Job task finished"),
                    Err(e) => error!(job_id = %id, error = %e, "Job task failed"),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZeroResultsPolicy;
    use crate::model::{Intensity, JobParams, Platform};
    use crate::pipeline::PipelineConfig;
    use crate::provider::ProviderRegistry;
    use crate::store::SqliteJobStore;

    fn orchestrator(store: &SqliteJobStore) -> Orchestrator {
        let store: Arc<dyn JobStore> = Arc::new(store.clone());
        let pipeline = Pipeline::new(
            Arc::clone(&store),
            ProviderRegistry::simulated(Duration::ZERO),
            PipelineConfig {
                primary_platform: Platform::GoogleMaps,
                secondary_platform: None,
                zero_results_policy: ZeroResultsPolicy::Complete,
                batch_pause: Duration::ZERO,
            },
        );
        Orchestrator::new(
            store,
            pipeline,
            JobProgressBroadcaster::new(64),
            OrchestratorSettings {
                max_concurrent_jobs: 2,
                poll_interval: Duration::from_millis(10),
                retry: RetryPolicy::none(),
                notifier: None,
            },
        )
    }

    fn queued(store: &SqliteJobStore) -> Job {
        let job = Job::new(JobParams {
            industry: "bakery".to_string(),
            location: "Boston, MA".to_string(),
            radius: 25,
            max_results: 10,
            keywords: Vec::new(),
            job_title: None,
            platforms: vec![Platform::GoogleMaps],
            intensity: Intensity::Basic,
            webhook_url: None,
        });
        store.create_job(&job).unwrap();
        job
    }

    #[tokio::test]
    async fn test_process_job_completes() {
        let store = SqliteJobStore::in_memory().unwrap();
        let orchestrator = orchestrator(&store);
        let job = queued(&store);

        let outcome = orchestrator.process_job(&job.id).await.unwrap();
        assert_eq!(outcome, JobOutcome::Completed { results_count: 10 });

        let job = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_some());
        assert!(orchestrator.active_job_ids().is_empty());

        let stats = store.daily_stats(None, None).unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_succeeded, 1);
        assert_eq!(stats[0].total_leads, 10);
    }

    #[tokio::test]
    async fn test_process_finished_job_is_skipped() {
        let store = SqliteJobStore::in_memory().unwrap();
        let orchestrator = orchestrator(&store);
        let job = queued(&store);
        orchestrator.process_job(&job.id).await.unwrap();

        let outcome = orchestrator.process_job(&job.id).await.unwrap();
        assert_eq!(outcome, JobOutcome::Skipped(JobStatus::Completed));
    }

    #[tokio::test]
    async fn test_process_unknown_job() {
        let store = SqliteJobStore::in_memory().unwrap();
        let err = orchestrator(&store).process_job("nope").await.unwrap_err();
        assert!(matches!(err, LeadgenError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_queued_and_terminal() {
        let store = SqliteJobStore::in_memory().unwrap();
        let orchestrator = orchestrator(&store);
        let job = queued(&store);

        let cancelled = orchestrator.cancel_job(&job.id).unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());

        let err = orchestrator.cancel_job(&job.id).unwrap_err();
        assert!(matches!(
            err,
            LeadgenError::AlreadyTerminal {
                status: JobStatus::Cancelled,
                ..
            }
        ));
        assert_eq!(err.status_code(), 400);

        let err = orchestrator.cancel_job("missing").unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_recover_orphans() {
        let store = SqliteJobStore::in_memory().unwrap();
        let orchestrator = orchestrator(&store);
        let job = queued(&store);
        store
            .transition(
                &job.id,
                &[JobStatus::Queued],
                JobStatus::Processing,
                &Transition::default(),
            )
            .unwrap();

        assert_eq!(orchestrator.recover_orphans().unwrap(), 1);
        let job = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some(ORPHAN_MESSAGE));
    }

    #[tokio::test]
    async fn test_run_drains_queue_until_shutdown() {
        let store = SqliteJobStore::in_memory().unwrap();
        let orchestrator = orchestrator(&store);
        let ids: Vec<String> = (0..3).map(|_| queued(&store).id).collect();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let orchestrator = orchestrator.clone();
            let shutdown = shutdown.clone();
            async move { orchestrator.run(shutdown).await }
        });

        for _ in 0..200 {
            let done = ids.iter().all(|id| {
                store
                    .get_job(id)
                    .unwrap()
                    .is_some_and(|j| j.status == JobStatus::Completed)
            });
            if done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        for id in &ids {
            assert_eq!(store.get_job(id).unwrap().unwrap().status, JobStatus::Completed);
        }
        assert_eq!(orchestrator.health().active_jobs, 0);
        assert_eq!(orchestrator.health().max_concurrent_jobs, 2);
    }
}
