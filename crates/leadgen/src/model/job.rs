use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::platform::{Intensity, Platform};
use super::ParseEnumError;

/// Lifecycle state of a job.
///
/// `Queued → Processing → {Completed, Failed, Cancelled}`, with
/// `Queued → Cancelled` as the only shortcut. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::Processing) => true,
            (JobStatus::Queued | JobStatus::Processing, JobStatus::Cancelled) => true,
            (JobStatus::Processing, JobStatus::Completed | JobStatus::Failed) => true,
            _ => false,
        }
    }

    /// Statuses a job may be in for a move to `to`, used as the
    /// compare-and-set guard of a store transition.
    pub fn sources_of(to: JobStatus) -> Vec<JobStatus> {
        JobStatus::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(to))
            .collect()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| ParseEnumError::new("job status", s))
    }
}

/// Validated parameters a job was submitted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    pub industry: String,
    pub location: String,
    pub radius: u32,
    pub max_results: u32,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    pub platforms: Vec<Platform>,
    pub intensity: Intensity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl JobParams {
    /// Enrichment runs when more than one platform was requested or the
    /// intensity is above the minimum level.
    pub fn needs_enrichment(&self) -> bool {
        self.platforms.len() > 1 || self.intensity > Intensity::Basic
    }

    /// Requested platforms minus the one leads were discovered on.
    pub fn enrichment_platforms(&self, discovery_platform: Platform) -> Vec<Platform> {
        self.platforms
            .iter()
            .copied()
            .filter(|p| *p != discovery_platform)
            .collect()
    }
}

/// A lead generation job and its progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub params: JobParams,
    pub status: JobStatus,
    pub progress: u8,
    pub results_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a freshly queued job.
    pub fn new(params: JobParams) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            params,
            status: JobStatus::Queued,
            progress: 0,
            results_count: 0,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Remaining seconds extrapolated from elapsed time and progress so far.
    /// Only defined while processing with non-zero progress.
    pub fn estimated_remaining_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        if self.status != JobStatus::Processing || self.progress == 0 {
            return None;
        }
        let started_at = self.started_at?;
        let elapsed = (now - started_at).num_milliseconds().max(0) as f64 / 1000.0;
        let total = elapsed * (100.0 / f64::from(self.progress));
        Some((total - elapsed).max(0.0) as u64)
    }

    /// Wall-clock run time for jobs that started and finished.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0)),
            _ => None,
        }
    }
}
