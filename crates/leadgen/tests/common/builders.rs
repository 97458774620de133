//! Builders for test configurations and job requests.

#![allow(dead_code)]

use leadgen::config::{Config, ZeroResultsPolicy};
use leadgen::{Intensity, JobRequest, Platform};

/// Builder for `Config` tuned for tests: no batch pause, no retry backoff,
/// fast polling.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.orchestrator.poll_interval_ms = 10;
        config.retry.max_retries = 0;
        config.retry.backoff_ms = 0;
        config.pipeline.batch_pause_ms = 0;
        config.webhook.timeout_ms = 200;
        Self { config }
    }

    pub fn max_concurrent_jobs(mut self, n: usize) -> Self {
        self.config.orchestrator.max_concurrent_jobs = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.retry.max_retries = n;
        self
    }

    pub fn zero_results_policy(mut self, policy: ZeroResultsPolicy) -> Self {
        self.config.pipeline.zero_results_policy = policy;
        self
    }

    pub fn query_secondary(mut self, enabled: bool) -> Self {
        self.config.pipeline.query_secondary = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobRequest`.
pub struct RequestBuilder {
    request: JobRequest,
}

impl RequestBuilder {
    pub fn new(industry: &str, location: &str) -> Self {
        Self {
            request: JobRequest::new(industry, location),
        }
    }

    /// The bakery search used across scenarios.
    pub fn bakery() -> Self {
        Self::new("bakery", "Boston, MA")
    }

    pub fn max_results(mut self, n: u32) -> Self {
        self.request.max_results = n;
        self
    }

    pub fn platforms(mut self, platforms: &[Platform]) -> Self {
        self.request.platforms = platforms.to_vec();
        self
    }

    pub fn intensity(mut self, intensity: Intensity) -> Self {
        self.request.intensity = intensity;
        self
    }

    pub fn webhook_url(mut self, url: &str) -> Self {
        self.request.webhook_url = Some(url.to_string());
        self
    }

    pub fn build(self) -> JobRequest {
        self.request
    }
}
