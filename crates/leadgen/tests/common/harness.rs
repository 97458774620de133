//! Test harness for isolated job execution.
//!
//! Every harness owns a temp directory with its own SQLite database, so tests
//! never share state.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use leadgen::config::Config;
use leadgen::db::Database;
use leadgen::model::{Job, JobStatus, Lead};
use leadgen::provider::ProviderRegistry;
use leadgen::{JobOutcome, JobRequest, JobService, JobStore, SqliteJobStore};

use super::builders::ConfigBuilder;

pub struct TestHarness {
    _temp_dir: TempDir,
    /// Direct handle on the underlying store for assertions.
    pub store: SqliteJobStore,
    pub service: JobService,
}

impl TestHarness {
    /// Simulated providers, test config.
    pub fn new() -> Self {
        Self::with_config(ConfigBuilder::new().build())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_providers(ProviderRegistry::simulated(Duration::ZERO), config)
    }

    pub fn with_providers(providers: ProviderRegistry, config: Config) -> Self {
        Self::build(providers, config, |store| Arc::new(store) as Arc<dyn JobStore>)
    }

    /// Lets the test wrap the store the service talks to.
    pub fn build<F>(providers: ProviderRegistry, config: Config, wrap: F) -> Self
    where
        F: FnOnce(SqliteJobStore) -> Arc<dyn JobStore>,
    {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("leadgen.db"))
            .expect("Failed to open test database");
        let store = SqliteJobStore::new(db);
        let service = JobService::with_providers(wrap(store.clone()), providers, &config);
        Self {
            _temp_dir: temp_dir,
            store,
            service,
        }
    }

    pub fn submit(&self, request: JobRequest) -> String {
        self.service
            .submit(request)
            .expect("Failed to submit job")
            .job_id
    }

    pub async fn run_job(&self, job_id: &str) -> JobOutcome {
        self.service
            .orchestrator()
            .process_job(job_id)
            .await
            .expect("process_job failed")
    }

    pub fn job(&self, job_id: &str) -> Job {
        self.store
            .get_job(job_id)
            .expect("Failed to load job")
            .expect("Job not found")
    }

    pub fn leads(&self, job_id: &str) -> Vec<Lead> {
        self.store.leads_for_job(job_id).expect("Failed to load leads")
    }

    /// Polls until `predicate` holds for the job or `timeout` passes.
    pub async fn wait_for<P>(&self, job_id: &str, timeout: Duration, predicate: P) -> Job
    where
        P: Fn(&Job) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let job = self.job(job_id);
            if predicate(&job) {
                return job;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("Timed out waiting for job {job_id}, last state: {job:?}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn wait_for_status(&self, job_id: &str, status: JobStatus) -> Job {
        self.wait_for(job_id, Duration::from_secs(10), |job| job.status == status)
            .await
    }
}
