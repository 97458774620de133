use crate::broadcast::job_progress::{JobProgressTracker, JobStage};

/// Events emitted while a job runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Stage {
        stage: JobStage,
        progress: u8,
        message: String,
    },
    Results {
        stage: JobStage,
        progress: u8,
        results_count: u32,
        message: String,
    },
    Retrying {
        progress: u8,
        attempt: u32,
        error: String,
    },
    Completed {
        results_count: u32,
    },
    Failed {
        progress: u8,
        error: String,
    },
    Cancelled {
        progress: u8,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges pipeline events onto the broadcast channel.
pub struct BroadcastProgress {
    tracker: JobProgressTracker,
}

impl BroadcastProgress {
    pub fn new(tracker: JobProgressTracker) -> Self {
        Self { tracker }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Stage {
                stage,
                progress,
                message,
            } => self.tracker.update_stage(stage, progress, &message),
            ProgressEvent::Results {
                stage,
                progress,
                results_count,
                message,
            } => self
                .tracker
                .results(stage, progress, results_count, &message),
            ProgressEvent::Retrying {
                progress,
                attempt,
                error,
            } => self.tracker.retrying(progress, attempt, &error),
            ProgressEvent::Completed { results_count } => self.tracker.completed(results_count),
            ProgressEvent::Failed { progress, error } => self.tracker.failed(progress, &error),
            ProgressEvent::Cancelled { progress } => self.tracker.cancelled(progress),
        }
    }
}
