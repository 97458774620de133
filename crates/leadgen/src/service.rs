//! Caller-facing job operations: submission with validation, status and
//! result queries, export, listing, cancellation, statistics and cleanup.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::broadcast::JobProgressBroadcaster;
use crate::config::Config;
use crate::db::Database;
use crate::error::{ConfigError, LeadgenError, Result, ValidationError};
use crate::export::{self, ExportFormat, ExportedResults};
use crate::model::{Intensity, Job, JobParams, JobStatus, Lead, Platform};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::provider::ProviderRegistry;
use crate::store::{
    DailyStatRow, JobQuery, JobStore, PlatformStat, SqliteJobStore, StatusCounts,
};
use crate::worker::orchestrator::{HealthStatus, Orchestrator, OrchestratorSettings};

const MAX_KEYWORDS: usize = 5;
const DEFAULT_RESULTS_LIMIT: u64 = 100;
const MAX_RESULTS_LIMIT: u64 = 1000;
const DEFAULT_LIST_LIMIT: u64 = 50;
const MAX_LIST_LIMIT: u64 = 100;
const MAX_OFFSET: u64 = i64::MAX as u64;
pub const DEFAULT_CLEANUP_DAYS: u32 = 30;

fn default_radius() -> u32 {
    25
}

fn default_max_results() -> u32 {
    100
}

fn default_platforms() -> Vec<Platform> {
    vec![Platform::PRIMARY]
}

/// A job submission as received from a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub industry: String,
    pub location: String,
    #[serde(default = "default_radius")]
    pub radius: u32,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default = "default_platforms")]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub intensity: Intensity,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl JobRequest {
    pub fn new(industry: &str, location: &str) -> Self {
        Self {
            industry: industry.to_string(),
            location: location.to_string(),
            radius: default_radius(),
            max_results: default_max_results(),
            keywords: Vec::new(),
            job_title: None,
            platforms: default_platforms(),
            intensity: Intensity::default(),
            webhook_url: None,
        }
    }

    /// Checks bounds and normalizes the request into job parameters.
    pub fn validate(self) -> std::result::Result<JobParams, ValidationError> {
        check_length("industry", &self.industry, 1, 100)?;
        check_length("location", &self.location, 1, 200)?;
        if let Some(title) = &self.job_title {
            check_length("job_title", title, 0, 200)?;
        }
        check_range("radius", u64::from(self.radius), 1, 100)?;
        check_range("max_results", u64::from(self.max_results), 1, 1000)?;

        if self.keywords.len() > MAX_KEYWORDS {
            return Err(ValidationError::TooManyKeywords {
                max: MAX_KEYWORDS,
                count: self.keywords.len(),
            });
        }
        let keywords: Vec<String> = self
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();

        let mut platforms: Vec<Platform> = Vec::with_capacity(self.platforms.len());
        for platform in self.platforms {
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        if platforms.is_empty() {
            return Err(ValidationError::NoPlatforms);
        }

        let webhook_url = self
            .webhook_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        if let Some(url) = &webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ValidationError::InvalidWebhookUrl);
            }
        }

        Ok(JobParams {
            industry: self.industry.trim().to_string(),
            location: self.location.trim().to_string(),
            radius: self.radius,
            max_results: self.max_results,
            keywords,
            job_title: self
                .job_title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            platforms,
            intensity: self.intensity,
            webhook_url,
        })
    }
}

fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> std::result::Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(ValidationError::Length { field, min, max });
    }
    Ok(())
}

fn check_range(
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
) -> std::result::Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

/// Rough run time in whole seconds for a job with these parameters.
pub fn estimate_duration_secs(params: &JobParams) -> u64 {
    let volume = (f64::from(params.max_results) / 100.0).min(5.0);
    let platforms = 1.0 + 0.5 * params.platforms.len() as f64;
    (60.0 * volume * params.intensity.duration_multiplier() * platforms) as u64
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub estimated_duration_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    #[serde(flatten)]
    pub job: Job,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_remaining_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsPage {
    pub job_id: String,
    pub status: JobStatus,
    pub results_count: u32,
    pub offset: u64,
    pub limit: u64,
    pub has_more: bool,
    pub leads: Vec<Lead>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobList {
    pub jobs: Vec<Job>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub jobs: StatusCounts,
    pub total_jobs: u64,
    pub total_leads: u64,
    pub success_rate: f64,
    /// Queued plus processing.
    pub active_jobs: u64,
    pub avg_job_duration_secs: Option<f64>,
    pub platforms: Vec<PlatformStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub days: u32,
    pub deleted_jobs: usize,
}

/// Entry point for every job operation.
#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn JobStore>,
    orchestrator: Orchestrator,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>, orchestrator: Orchestrator) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Opens the configured database and wires the simulated providers,
    /// pipeline and orchestrator together.
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config.database_path().ok_or_else(|| ConfigError::Validation {
            message: "no database_path configured and no home directory found".to_string(),
        })?;
        let db = Database::open(&path)?;
        log::info!("Using database at {}", path.display());
        Ok(Self::with_store(Arc::new(SqliteJobStore::new(db)), config))
    }

    pub fn with_store(store: Arc<dyn JobStore>, config: &Config) -> Self {
        let providers = ProviderRegistry::simulated(Duration::from_millis(
            config.providers.simulated_latency_ms,
        ));
        Self::with_providers(store, providers, config)
    }

    pub fn with_providers(
        store: Arc<dyn JobStore>,
        providers: ProviderRegistry,
        config: &Config,
    ) -> Self {
        let pipeline = Pipeline::new(
            Arc::clone(&store),
            providers,
            PipelineConfig::from_config(config),
        );
        let orchestrator = Orchestrator::new(
            Arc::clone(&store),
            pipeline,
            JobProgressBroadcaster::default(),
            OrchestratorSettings::from_config(config),
        );
        Self::new(store, orchestrator)
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn broadcaster(&self) -> &JobProgressBroadcaster {
        self.orchestrator.broadcaster()
    }

    /// Validates and queues a job.
    pub fn submit(&self, request: JobRequest) -> Result<SubmitResponse> {
        let params = request.validate()?;
        let estimated_duration_secs = estimate_duration_secs(&params);
        let job = Job::new(params);
        self.store.create_job(&job)?;
        self.broadcaster().start_job(&job.id);
        tracing::info!(
            job_id = %job.id,
            industry = %job.params.industry,
            location = %job.params.location,
            "Job submitted"
        );
        Ok(SubmitResponse {
            job_id: job.id,
            status: job.status,
            estimated_duration_secs,
        })
    }

    fn require_job(&self, job_id: &str) -> Result<Job> {
        self.store
            .get_job(job_id)?
            .ok_or_else(|| LeadgenError::NotFound(job_id.to_string()))
    }

    pub fn status(&self, job_id: &str) -> Result<JobStatusView> {
        let job = self.require_job(job_id)?;
        let estimated_remaining_secs = job.estimated_remaining_secs(Utc::now());
        Ok(JobStatusView {
            job,
            estimated_remaining_secs,
        })
    }

    /// Leads of a job, newest first.
    pub fn results(&self, job_id: &str, offset: u64, limit: Option<u64>) -> Result<ResultsPage> {
        let limit = limit.unwrap_or(DEFAULT_RESULTS_LIMIT);
        check_range("limit", limit, 1, MAX_RESULTS_LIMIT)?;
        check_range("offset", offset, 0, MAX_OFFSET)?;
        let job = self.require_job(job_id)?;
        let leads = self.store.lead_page(job_id, offset, limit)?;
        Ok(ResultsPage {
            job_id: job.id,
            status: job.status,
            results_count: job.results_count,
            offset,
            limit,
            has_more: offset.saturating_add(limit) < u64::from(job.results_count),
            leads,
        })
    }

    pub fn list(&self, status: Option<JobStatus>, offset: u64, limit: Option<u64>) -> Result<JobList> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        check_range("limit", limit, 1, MAX_LIST_LIMIT)?;
        check_range("offset", offset, 0, MAX_OFFSET)?;
        let page = self.store.list_jobs(&JobQuery {
            status,
            offset,
            limit,
        })?;
        Ok(JobList {
            jobs: page.jobs,
            total: page.total,
            offset,
            limit,
        })
    }

    /// Renders a job's leads for download. Only Completed and Processing
    /// jobs can be exported; a Processing job exports what is persisted so far.
    pub fn export(
        &self,
        job_id: &str,
        format: ExportFormat,
        include_enrichment: bool,
    ) -> Result<ExportedResults> {
        let job = self.require_job(job_id)?;
        if !matches!(job.status, JobStatus::Completed | JobStatus::Processing) {
            return Err(LeadgenError::NotExportable {
                id: job.id,
                status: job.status,
            });
        }
        let leads = self.store.leads_for_job(job_id)?;
        let content = export::render(&leads, format, include_enrichment)?;
        tracing::info!(
            job_id = %job_id,
            format = %format,
            records = leads.len(),
            bytes = content.len(),
            "Exported job results"
        );
        Ok(ExportedResults {
            job_id: job.id,
            format,
            content_type: format.content_type(),
            include_enrichment,
            record_count: leads.len(),
            size_bytes: content.len(),
            content,
        })
    }

    pub fn cancel(&self, job_id: &str) -> Result<Job> {
        self.orchestrator.cancel_job(job_id)
    }

    pub fn stats(&self) -> Result<SystemStats> {
        let jobs = self.store.status_counts()?;
        let total_jobs = jobs.total();
        let success_rate = if total_jobs == 0 {
            0.0
        } else {
            jobs.completed as f64 / total_jobs as f64
        };
        Ok(SystemStats {
            jobs,
            total_jobs,
            total_leads: self.store.lead_count()?,
            success_rate,
            active_jobs: jobs.queued + jobs.processing,
            avg_job_duration_secs: self.store.avg_job_duration_secs()?,
            platforms: self.store.platform_stats()?,
        })
    }

    pub fn daily_stats(&self, from: Option<&str>, to: Option<&str>) -> Result<Vec<DailyStatRow>> {
        Ok(self.store.daily_stats(from, to)?)
    }

    /// Deletes finished jobs older than `days` days together with their leads.
    pub fn cleanup(&self, days: Option<u32>) -> Result<CleanupReport> {
        let days = days.unwrap_or(DEFAULT_CLEANUP_DAYS);
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let deleted_jobs = self.store.delete_finished_before(cutoff)?;
        tracing::info!(days, deleted_jobs, "Cleaned up finished jobs");
        Ok(CleanupReport { days, deleted_jobs })
    }

    pub fn health(&self) -> HealthStatus {
        self.orchestrator.health()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (JobService, SqliteJobStore) {
        let store = SqliteJobStore::in_memory().unwrap();
        let mut config = Config::default();
        config.pipeline.batch_pause_ms = 0;
        config.retry.max_retries = 0;
        let service = JobService::with_store(Arc::new(store.clone()), &config);
        (service, store)
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: JobRequest =
            serde_json::from_str(r#"{"industry": "bakery", "location": "Boston, MA"}"#).unwrap();
        assert_eq!(request, JobRequest::new("bakery", "Boston, MA"));
        assert_eq!(request.radius, 25);
        assert_eq!(request.max_results, 100);
        assert_eq!(request.platforms, vec![Platform::GoogleMaps]);
        assert_eq!(request.intensity, Intensity::Standard);
    }

    #[test]
    fn test_validate_normalizes() {
        let mut request = JobRequest::new("  bakery ", "Boston, MA");
        request.keywords = vec![" sourdough ".to_string(), "  ".to_string()];
        request.platforms = vec![Platform::GoogleMaps, Platform::Linkedin, Platform::GoogleMaps];
        request.job_title = Some("   ".to_string());

        let params = request.validate().unwrap();
        assert_eq!(params.industry, "bakery");
        assert_eq!(params.keywords, vec!["sourdough".to_string()]);
        assert_eq!(params.platforms, vec![Platform::GoogleMaps, Platform::Linkedin]);
        assert_eq!(params.job_title, None);
    }

    #[test]
    fn test_validate_rejects() {
        let cases: Vec<(fn(&mut JobRequest), ValidationError)> = vec![
            (
                |r| r.industry = String::new(),
                ValidationError::Length {
                    field: "industry",
                    min: 1,
                    max: 100,
                },
            ),
            (
                |r| r.location = "x".repeat(201),
                ValidationError::Length {
                    field: "location",
                    min: 1,
                    max: 200,
                },
            ),
            (
                |r| r.radius = 0,
                ValidationError::OutOfRange {
                    field: "radius",
                    min: 1,
                    max: 100,
                    value: 0,
                },
            ),
            (
                |r| r.max_results = 1001,
                ValidationError::OutOfRange {
                    field: "max_results",
                    min: 1,
                    max: 1000,
                    value: 1001,
                },
            ),
            (
                |r| r.keywords = vec!["k".to_string(); 6],
                ValidationError::TooManyKeywords { max: 5, count: 6 },
            ),
            (|r| r.platforms.clear(), ValidationError::NoPlatforms),
            (
                |r| r.webhook_url = Some("ftp://example.com".to_string()),
                ValidationError::InvalidWebhookUrl,
            ),
        ];

        for (mutate, expected) in cases {
            let mut request = JobRequest::new("bakery", "Boston, MA");
            mutate(&mut request);
            assert_eq!(request.validate().unwrap_err(), expected);
        }
    }

    #[test]
    fn test_estimate_duration() {
        let mut params = JobRequest::new("bakery", "Boston, MA").validate().unwrap();
        // 60 * 1 * 2 * 1.5
        assert_eq!(estimate_duration_secs(&params), 180);

        params.max_results = 1000;
        params.intensity = Intensity::Premium;
        params.platforms = vec![Platform::GoogleMaps, Platform::Linkedin];
        // 60 * 5 * 4 * 2
        assert_eq!(estimate_duration_secs(&params), 2400);

        params.max_results = 10;
        params.intensity = Intensity::Basic;
        params.platforms = vec![Platform::GoogleMaps];
        // 60 * 0.1 * 1 * 1.5 = 9
        assert_eq!(estimate_duration_secs(&params), 9);
    }

    #[test]
    fn test_submit_and_status() {
        let (service, _store) = service();
        let response = service
            .submit(JobRequest::new("bakery", "Boston, MA"))
            .unwrap();
        assert_eq!(response.status, JobStatus::Queued);
        assert_eq!(response.estimated_duration_secs, 180);

        let view = service.status(&response.job_id).unwrap();
        assert_eq!(view.job.status, JobStatus::Queued);
        assert!(view.estimated_remaining_secs.is_none());

        let err = service.status("missing").unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_limits_are_validated() {
        let (service, _store) = service();
        let job_id = service
            .submit(JobRequest::new("bakery", "Boston, MA"))
            .unwrap()
            .job_id;

        assert!(matches!(
            service.results(&job_id, 0, Some(0)),
            Err(LeadgenError::Validation(_))
        ));
        assert!(matches!(
            service.list(None, 0, Some(101)),
            Err(LeadgenError::Validation(_))
        ));
        assert_eq!(service.list(None, 0, None).unwrap().limit, 50);
    }

    #[tokio::test]
    async fn test_results_pagination() {
        let (service, _store) = service();
        let mut request = JobRequest::new("bakery", "Boston, MA");
        request.max_results = 10;
        request.intensity = Intensity::Basic;
        let job_id = service.submit(request).unwrap().job_id;
        service.orchestrator().process_job(&job_id).await.unwrap();

        let first = service.results(&job_id, 0, Some(4)).unwrap();
        assert_eq!(first.results_count, 10);
        assert_eq!(first.leads.len(), 4);
        assert!(first.has_more);

        let last = service.results(&job_id, 8, Some(4)).unwrap();
        assert_eq!(last.leads.len(), 2);
        assert!(!last.has_more);
    }

    #[tokio::test]
    async fn test_export_requires_completed_or_processing() {
        let (service, _store) = service();
        let mut request = JobRequest::new("bakery", "Boston, MA");
        request.max_results = 6;
        request.intensity = Intensity::Basic;

        let queued = service.submit(request.clone()).unwrap().job_id;
        let err = service.export(&queued, ExportFormat::Csv, true).unwrap_err();
        assert!(matches!(
            err,
            LeadgenError::NotExportable {
                status: JobStatus::Queued,
                ..
            }
        ));
        assert_eq!(err.status_code(), 400);

        let err = service.export("missing", ExportFormat::Json, true).unwrap_err();
        assert_eq!(err.status_code(), 404);

        let done = service.submit(request).unwrap().job_id;
        service.orchestrator().process_job(&done).await.unwrap();
        let export = service.export(&done, ExportFormat::Json, false).unwrap();
        assert_eq!(export.record_count, 6);
        assert_eq!(export.size_bytes, export.content.len());
        assert_eq!(export.content_type, "application/json");
        let rows: serde_json::Value = serde_json::from_slice(&export.content).unwrap();
        assert_eq!(rows.as_array().map(Vec::len), Some(6));
    }

    #[tokio::test]
    async fn test_huge_offsets() {
        let (service, _store) = service();
        let mut request = JobRequest::new("bakery", "Boston, MA");
        request.max_results = 3;
        request.intensity = Intensity::Basic;
        let job_id = service.submit(request).unwrap().job_id;
        service.orchestrator().process_job(&job_id).await.unwrap();

        let past_end = service
            .results(&job_id, i64::MAX as u64, Some(1000))
            .unwrap();
        assert!(past_end.leads.is_empty());
        assert!(!past_end.has_more);

        let err = service.results(&job_id, u64::MAX, Some(10)).unwrap_err();
        assert!(matches!(
            err,
            LeadgenError::Validation(ValidationError::OutOfRange { field: "offset", .. })
        ));
        assert_eq!(err.status_code(), 400);

        assert!(service.list(None, i64::MAX as u64, None).unwrap().jobs.is_empty());
        assert!(matches!(
            service.list(None, u64::MAX, None),
            Err(LeadgenError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_stats() {
        let (service, _store) = service();
        let empty = service.stats().unwrap();
        assert_eq!(empty.total_jobs, 0);
        assert_eq!(empty.success_rate, 0.0);

        let mut request = JobRequest::new("bakery", "Boston, MA");
        request.max_results = 5;
        request.intensity = Intensity::Basic;
        let done = service.submit(request.clone()).unwrap().job_id;
        service.orchestrator().process_job(&done).await.unwrap();
        service.submit(request).unwrap();

        let stats = service.stats().unwrap();
        assert_eq!(stats.total_jobs, 2);
        assert_eq!(stats.jobs.completed, 1);
        assert_eq!(stats.active_jobs, 1);
        assert_eq!(stats.total_leads, 5);
        assert!((stats.success_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.platforms.len(), 1);
        assert_eq!(stats.platforms[0].platform, Platform::GoogleMaps);
        assert_eq!(service.health().status, "healthy");
    }

    #[test]
    fn test_cleanup_keeps_recent_jobs() {
        let (service, _store) = service();
        let job_id = service
            .submit(JobRequest::new("bakery", "Boston, MA"))
            .unwrap()
            .job_id;
        service.cancel(&job_id).unwrap();

        let report = service.cleanup(None).unwrap();
        assert_eq!(report.days, 30);
        assert_eq!(report.deleted_jobs, 0);
        assert!(service.status(&job_id).is_ok());
    }
}
