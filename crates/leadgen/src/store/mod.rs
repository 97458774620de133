//! Abstract job store.
//!
//! The pipeline and orchestrator only talk to [`JobStore`]; the shipped
//! implementation is [`SqliteJobStore`]. Every status change is a
//! compare-and-set so concurrent writers never overwrite each other.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::DatabaseError;
use crate::model::{EnrichmentRecord, Job, JobStatus, Lead, LeadScores};

mod sqlite;

pub use crate::db::job_repo::{StatusCounts, Transition};
pub use crate::db::lead_repo::PlatformStat;
pub use crate::db::stats_repo::DailyStatRow;
pub use sqlite::SqliteJobStore;

/// Errors from a job store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The backing store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Listing filter with pagination.
#[derive(Debug, Clone, Default)]
pub struct JobQuery {
    pub status: Option<JobStatus>,
    pub offset: u64,
    pub limit: u64,
}

/// One page of a job listing plus the number of matching jobs.
#[derive(Debug, Clone)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub total: u64,
}

/// CRUD plus atomic status/progress updates for jobs and their leads.
///
/// Implementations are synchronous; calls are short critical sections.
pub trait JobStore: Send + Sync {
    fn create_job(&self, job: &Job) -> Result<(), StoreError>;

    fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError>;

    fn list_jobs(&self, query: &JobQuery) -> Result<JobPage, StoreError>;

    /// IDs of queued jobs in arrival order.
    fn queued_job_ids(&self, limit: usize) -> Result<Vec<String>, StoreError>;

    /// Sets `to` if the current status is in `from`. Returns whether it applied.
    fn transition(
        &self,
        id: &str,
        from: &[JobStatus],
        to: JobStatus,
        change: &Transition,
    ) -> Result<bool, StoreError>;

    /// Raises progress of a processing job. Returns `false` once the job
    /// left Processing.
    fn update_progress(&self, id: &str, progress: u8) -> Result<bool, StoreError>;

    fn set_results_count(&self, id: &str, count: u32) -> Result<bool, StoreError>;

    /// Records a failed attempt that is going to be retried.
    fn record_retry(&self, id: &str, error_message: &str) -> Result<bool, StoreError>;

    /// Replaces the job's lead set atomically.
    fn replace_leads(&self, job_id: &str, leads: &[Lead]) -> Result<usize, StoreError>;

    fn leads_for_job(&self, job_id: &str) -> Result<Vec<Lead>, StoreError>;

    /// Leads newest first.
    fn lead_page(&self, job_id: &str, offset: u64, limit: u64) -> Result<Vec<Lead>, StoreError>;

    fn save_enrichment(
        &self,
        lead: &Lead,
        records: &[EnrichmentRecord],
    ) -> Result<(), StoreError>;

    fn save_scores(&self, lead_id: &str, scores: &LeadScores) -> Result<(), StoreError>;

    fn enrichment_records(&self, lead_id: &str) -> Result<Vec<EnrichmentRecord>, StoreError>;

    fn status_counts(&self) -> Result<StatusCounts, StoreError>;

    fn lead_count(&self) -> Result<u64, StoreError>;

    fn platform_stats(&self) -> Result<Vec<PlatformStat>, StoreError>;

    fn avg_job_duration_secs(&self) -> Result<Option<f64>, StoreError>;

    fn record_daily_stats(
        &self,
        date: &str,
        succeeded: bool,
        leads: u32,
        duration_ms: i64,
    ) -> Result<(), StoreError>;

    fn daily_stats(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Vec<DailyStatRow>, StoreError>;

    /// Deletes terminal jobs finished before `cutoff`, with their leads.
    fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}
