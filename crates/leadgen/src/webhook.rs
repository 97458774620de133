//! Outbound job notifications.
//!
//! Delivery is best effort: failures are logged and never change the job.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::WebhookConfig;
use crate::model::{Job, JobStatus};

/// JSON body posted to a job's webhook URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WebhookPayload {
    JobCompleted {
        job_id: String,
        status: JobStatus,
        results_count: u32,
        completed_at: DateTime<Utc>,
    },
    JobFailed {
        job_id: String,
        status: JobStatus,
        error_message: String,
        failed_at: DateTime<Utc>,
        retry_count: u32,
    },
}

impl WebhookPayload {
    /// Payload for a job that reached Completed or Failed; `None` otherwise.
    pub fn for_job(job: &Job) -> Option<Self> {
        let finished_at = job.completed_at.unwrap_or(job.updated_at);
        match job.status {
            JobStatus::Completed => Some(Self::JobCompleted {
                job_id: job.id.clone(),
                status: job.status,
                results_count: job.results_count,
                completed_at: finished_at,
            }),
            JobStatus::Failed => Some(Self::JobFailed {
                job_id: job.id.clone(),
                status: job.status,
                error_message: job.error_message.clone().unwrap_or_default(),
                failed_at: finished_at,
                retry_count: job.retry_count,
            }),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(Duration::from_millis(config.timeout_ms))
    }

    /// POSTs `payload` to `url`. Returns whether the receiver accepted it.
    pub async fn notify(&self, url: &str, payload: &WebhookPayload) -> bool {
        let result = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(url = %url, status = %response.status(), "Webhook delivered");
                true
            }
            Ok(response) => {
                tracing::warn!(url = %url, status = %response.status(), "Webhook rejected");
                false
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Webhook delivery failed");
                false
            }
        }
    }
}
