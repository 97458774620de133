//! Store wrapper that fails chosen operations a set number of times.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};

use leadgen::model::{EnrichmentRecord, Job, JobStatus, Lead, LeadScores};
use leadgen::store::{
    DailyStatRow, JobPage, JobQuery, JobStore, PlatformStat, SqliteJobStore, StatusCounts,
    StoreError, Transition,
};

/// Store operation a [`FlakyStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    ReplaceLeads,
    RecordRetry,
    /// A status transition to the given status.
    Transition(JobStatus),
}

pub struct FlakyStore {
    inner: SqliteJobStore,
    plan: Vec<(FailPoint, AtomicU32)>,
}

impl FlakyStore {
    /// Fails the next `failures` calls to `replace_leads`.
    pub fn new(inner: SqliteJobStore, failures: u32) -> Self {
        Self::failing(inner, FailPoint::ReplaceLeads, failures)
    }

    /// Fails the next `failures` calls matching `point`.
    pub fn failing(inner: SqliteJobStore, point: FailPoint, failures: u32) -> Self {
        Self {
            inner,
            plan: vec![(point, AtomicU32::new(failures))],
        }
    }

    /// Also fails the next `failures` calls matching `point`.
    pub fn and_failing(mut self, point: FailPoint, failures: u32) -> Self {
        self.plan.push((point, AtomicU32::new(failures)));
        self
    }

    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        let hit = self.plan.iter().any(|(p, left)| {
            *p == point
                && left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
        });
        if hit {
            return Err(StoreError::Unavailable("disk I/O error".to_string()));
        }
        Ok(())
    }
}

impl JobStore for FlakyStore {
    fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        self.inner.create_job(job)
    }

    fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        self.inner.get_job(id)
    }

    fn list_jobs(&self, query: &JobQuery) -> Result<JobPage, StoreError> {
        self.inner.list_jobs(query)
    }

    fn queued_job_ids(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        self.inner.queued_job_ids(limit)
    }

    fn transition(
        &self,
        id: &str,
        from: &[JobStatus],
        to: JobStatus,
        change: &Transition,
    ) -> Result<bool, StoreError> {
        self.check(FailPoint::Transition(to))?;
        self.inner.transition(id, from, to, change)
    }

    fn update_progress(&self, id: &str, progress: u8) -> Result<bool, StoreError> {
        self.inner.update_progress(id, progress)
    }

    fn set_results_count(&self, id: &str, count: u32) -> Result<bool, StoreError> {
        self.inner.set_results_count(id, count)
    }

    fn record_retry(&self, id: &str, error_message: &str) -> Result<bool, StoreError> {
        self.check(FailPoint::RecordRetry)?;
        self.inner.record_retry(id, error_message)
    }

    fn replace_leads(&self, job_id: &str, leads: &[Lead]) -> Result<usize, StoreError> {
        self.check(FailPoint::ReplaceLeads)?;
        self.inner.replace_leads(job_id, leads)
    }

    fn leads_for_job(&self, job_id: &str) -> Result<Vec<Lead>, StoreError> {
        self.inner.leads_for_job(job_id)
    }

    fn lead_page(&self, job_id: &str, offset: u64, limit: u64) -> Result<Vec<Lead>, StoreError> {
        self.inner.lead_page(job_id, offset, limit)
    }

    fn save_enrichment(&self, lead: &Lead, records: &[EnrichmentRecord]) -> Result<(), StoreError> {
        self.inner.save_enrichment(lead, records)
    }

    fn save_scores(&self, lead_id: &str, scores: &LeadScores) -> Result<(), StoreError> {
        self.inner.save_scores(lead_id, scores)
    }

    fn enrichment_records(&self, lead_id: &str) -> Result<Vec<EnrichmentRecord>, StoreError> {
        self.inner.enrichment_records(lead_id)
    }

    fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        self.inner.status_counts()
    }

    fn lead_count(&self) -> Result<u64, StoreError> {
        self.inner.lead_count()
    }

    fn platform_stats(&self) -> Result<Vec<PlatformStat>, StoreError> {
        self.inner.platform_stats()
    }

    fn avg_job_duration_secs(&self) -> Result<Option<f64>, StoreError> {
        self.inner.avg_job_duration_secs()
    }

    fn record_daily_stats(
        &self,
        date: &str,
        succeeded: bool,
        leads: u32,
        duration_ms: i64,
    ) -> Result<(), StoreError> {
        self.inner.record_daily_stats(date, succeeded, leads, duration_ms)
    }

    fn daily_stats(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Vec<DailyStatRow>, StoreError> {
        self.inner.daily_stats(from, to)
    }

    fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        self.inner.delete_finished_before(cutoff)
    }
}
