//! Job progress broadcaster for real-time job status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::JobStatus;

/// Stage of job processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Queued,
    Starting,
    Discovery,
    Persisting,
    Enriching,
    Scoring,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStage::Queued => write!(f, "Queued"),
            JobStage::Starting => write!(f, "Starting"),
            JobStage::Discovery => write!(f, "Discovering leads"),
            JobStage::Persisting => write!(f, "Saving leads"),
            JobStage::Enriching => write!(f, "Enriching leads"),
            JobStage::Scoring => write!(f, "Scoring leads"),
            JobStage::Retrying => write!(f, "Retrying"),
            JobStage::Completed => write!(f, "Completed"),
            JobStage::Failed => write!(f, "Failed"),
            JobStage::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Progress event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgressEvent {
    pub job_id: String,
    pub status: JobStatus,
    pub stage: JobStage,
    /// Progress percentage at the time of the event.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_count: Option<u32>,
    /// Human-readable message describing current activity.
    pub message: String,
    /// Error message (set on failure and before a retry).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl JobProgressEvent {
    /// Creates a new progress event. Status follows from the stage.
    pub fn new(job_id: &str, stage: JobStage, progress: u8, message: &str) -> Self {
        let status = match stage {
            JobStage::Queued => JobStatus::Queued,
            JobStage::Completed => JobStatus::Completed,
            JobStage::Failed => JobStatus::Failed,
            JobStage::Cancelled => JobStatus::Cancelled,
            _ => JobStatus::Processing,
        };

        Self {
            job_id: job_id.to_string(),
            status,
            stage,
            progress,
            results_count: None,
            message: message.to_string(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_results(mut self, results_count: u32) -> Self {
        self.results_count = Some(results_count);
        self
    }

    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Broadcasts job progress events for streaming.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    /// Creates a new job progress broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for one job without emitting anything.
    pub fn tracker(&self, job_id: &str) -> JobProgressTracker {
        JobProgressTracker::new(job_id, Arc::clone(&self.sender))
    }

    /// Creates a tracker for a newly submitted job and announces it as queued.
    pub fn start_job(&self, job_id: &str) -> JobProgressTracker {
        let tracker = self.tracker(job_id);
        tracker.update_stage(JobStage::Queued, 0, "Job queued for processing");
        tracker
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Tracks progress for a single job.
#[derive(Clone)]
pub struct JobProgressTracker {
    job_id: String,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressTracker {
    pub fn new(job_id: &str, sender: Arc<broadcast::Sender<JobProgressEvent>>) -> Self {
        Self {
            job_id: job_id.to_string(),
            sender,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    fn emit(&self, event: JobProgressEvent) {
        let _ = self.sender.send(event);
    }

    pub fn update_stage(&self, stage: JobStage, progress: u8, message: &str) {
        self.emit(JobProgressEvent::new(&self.job_id, stage, progress, message));
    }

    pub fn results(&self, stage: JobStage, progress: u8, results_count: u32, message: &str) {
        self.emit(
            JobProgressEvent::new(&self.job_id, stage, progress, message)
                .with_results(results_count),
        );
    }

    pub fn retrying(&self, progress: u8, attempt: u32, error: &str) {
        let message = format!("Attempt {} failed, retrying", attempt);
        self.emit(
            JobProgressEvent::new(&self.job_id, JobStage::Retrying, progress, &message)
                .with_error(error),
        );
    }

    pub fn completed(&self, results_count: u32) {
        self.emit(
            JobProgressEvent::new(
                &self.job_id,
                JobStage::Completed,
                100,
                "Job completed successfully",
            )
            .with_results(results_count),
        );
    }

    pub fn failed(&self, progress: u8, error: &str) {
        self.emit(
            JobProgressEvent::new(&self.job_id, JobStage::Failed, progress, "Job failed")
                .with_error(error),
        );
    }

    pub fn cancelled(&self, progress: u8) {
        self.emit(JobProgressEvent::new(
            &self.job_id,
            JobStage::Cancelled,
            progress,
            "Job cancelled",
        ));
    }
}
