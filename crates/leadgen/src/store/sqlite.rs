//! SQLite-backed job store.

use chrono::{DateTime, Utc};

use super::{
    DailyStatRow, JobPage, JobQuery, JobStore, PlatformStat, StatusCounts, StoreError, Transition,
};
use crate::db::job_repo::{self, JobFilter};
use crate::db::{lead_repo, stats_repo, Database};
use crate::model::{EnrichmentRecord, Job, JobStatus, Lead, LeadScores};

/// [`JobStore`] over the repositories in [`crate::db`].
#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// In-memory store with migrations applied.
    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl JobStore for SqliteJobStore {
    fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        job_repo::insert(&self.db, job)?;
        log::debug!("Created job {}", job.id);
        Ok(())
    }

    fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Ok(job_repo::find_by_id(&self.db, id)?)
    }

    fn list_jobs(&self, query: &JobQuery) -> Result<JobPage, StoreError> {
        let (jobs, total) = job_repo::query(
            &self.db,
            &JobFilter {
                status: query.status,
                limit: Some(query.limit),
                offset: Some(query.offset),
            },
        )?;
        Ok(JobPage { jobs, total })
    }

    fn queued_job_ids(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        Ok(job_repo::queued_ids(&self.db, limit)?)
    }

    fn transition(
        &self,
        id: &str,
        from: &[JobStatus],
        to: JobStatus,
        change: &Transition,
    ) -> Result<bool, StoreError> {
        let applied = job_repo::transition(&self.db, id, from, to, change, Utc::now())?;
        if applied {
            log::debug!("Job {} -> {}", id, to);
        } else {
            log::debug!("Job {} transition to {} did not apply", id, to);
        }
        Ok(applied)
    }

    fn update_progress(&self, id: &str, progress: u8) -> Result<bool, StoreError> {
        Ok(job_repo::update_progress(&self.db, id, progress, Utc::now())?)
    }

    fn set_results_count(&self, id: &str, count: u32) -> Result<bool, StoreError> {
        Ok(job_repo::set_results_count(&self.db, id, count, Utc::now())?)
    }

    fn record_retry(&self, id: &str, error_message: &str) -> Result<bool, StoreError> {
        Ok(job_repo::record_retry(&self.db, id, error_message, Utc::now())?)
    }

    fn replace_leads(&self, job_id: &str, leads: &[Lead]) -> Result<usize, StoreError> {
        Ok(lead_repo::replace_for_job(&self.db, job_id, leads)?)
    }

    fn leads_for_job(&self, job_id: &str) -> Result<Vec<Lead>, StoreError> {
        Ok(lead_repo::find_by_job(&self.db, job_id)?)
    }

    fn lead_page(&self, job_id: &str, offset: u64, limit: u64) -> Result<Vec<Lead>, StoreError> {
        Ok(lead_repo::page(&self.db, job_id, offset, limit)?)
    }

    fn save_enrichment(
        &self,
        lead: &Lead,
        records: &[EnrichmentRecord],
    ) -> Result<(), StoreError> {
        Ok(lead_repo::update_enrichment(&self.db, lead, records)?)
    }

    fn save_scores(&self, lead_id: &str, scores: &LeadScores) -> Result<(), StoreError> {
        Ok(lead_repo::update_scores(&self.db, lead_id, scores)?)
    }

    fn enrichment_records(&self, lead_id: &str) -> Result<Vec<EnrichmentRecord>, StoreError> {
        Ok(lead_repo::records_for_lead(&self.db, lead_id)?)
    }

    fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        Ok(job_repo::count_by_status(&self.db)?)
    }

    fn lead_count(&self) -> Result<u64, StoreError> {
        Ok(lead_repo::count(&self.db)?)
    }

    fn platform_stats(&self) -> Result<Vec<PlatformStat>, StoreError> {
        Ok(lead_repo::platform_stats(&self.db)?)
    }

    fn avg_job_duration_secs(&self) -> Result<Option<f64>, StoreError> {
        Ok(job_repo::avg_completed_duration_secs(&self.db)?)
    }

    fn record_daily_stats(
        &self,
        date: &str,
        succeeded: bool,
        leads: u32,
        duration_ms: i64,
    ) -> Result<(), StoreError> {
        Ok(stats_repo::record_job_completion(
            &self.db,
            date,
            succeeded,
            leads,
            duration_ms,
        )?)
    }

    fn daily_stats(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Vec<DailyStatRow>, StoreError> {
        Ok(stats_repo::query(&self.db, from, to)?)
    }

    fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let deleted = job_repo::delete_finished_before(&self.db, cutoff)?;
        if deleted > 0 {
            log::info!("Deleted {} finished jobs older than {}", deleted, cutoff);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Intensity, JobParams, Platform, RawLead};

    fn job() -> Job {
        Job::new(JobParams {
            industry: "dentist".to_string(),
            location: "Austin, TX".to_string(),
            radius: 10,
            max_results: 5,
            keywords: vec![],
            job_title: None,
            platforms: vec![Platform::GoogleMaps],
            intensity: Intensity::Standard,
            webhook_url: None,
        })
    }

    #[test]
    fn test_cancel_only_from_active_states() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = job();
        store.create_job(&job).unwrap();

        let cancel = Transition {
            set_completed: true,
            ..Default::default()
        };
        let active = [JobStatus::Queued, JobStatus::Processing];
        assert!(store
            .transition(&job.id, &active, JobStatus::Cancelled, &cancel)
            .unwrap());
        assert!(!store
            .transition(&job.id, &active, JobStatus::Cancelled, &cancel)
            .unwrap());

        let stored = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert!(stored.completed_at.is_some());
    }

    #[test]
    fn test_late_writes_after_cancel_are_noops() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = job();
        store.create_job(&job).unwrap();
        store
            .transition(
                &job.id,
                &[JobStatus::Queued],
                JobStatus::Processing,
                &Transition::default(),
            )
            .unwrap();
        store
            .transition(
                &job.id,
                &[JobStatus::Processing],
                JobStatus::Cancelled,
                &Transition::default(),
            )
            .unwrap();

        assert!(!store.update_progress(&job.id, 80).unwrap());
        assert!(!store.set_results_count(&job.id, 3).unwrap());
        assert_eq!(store.get_job(&job.id).unwrap().unwrap().progress, 0);
    }

    #[test]
    fn test_leads_round_trip_through_store() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = job();
        store.create_job(&job).unwrap();

        let leads: Vec<Lead> = (0..3)
            .map(|_| Lead::from_raw(&job.id, RawLead::default(), Platform::GoogleMaps))
            .collect();
        assert_eq!(store.replace_leads(&job.id, &leads).unwrap(), 3);
        assert_eq!(store.leads_for_job(&job.id).unwrap().len(), 3);
        assert_eq!(store.lead_count().unwrap(), 3);
    }
}
