//! Scripted providers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use leadgen::model::{Lead, Platform, RawLead};
use leadgen::provider::{
    DiscoveryCriteria, EnrichmentField, LeadProvider, ProviderError, ProviderRegistry,
    SimulatedProvider,
};

/// Simulated providers with `overrides` registered on top.
pub fn registry_with(overrides: Vec<Arc<dyn LeadProvider>>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::simulated(Duration::ZERO);
    for provider in overrides {
        registry.register(provider);
    }
    registry
}

/// Every call fails with a request error.
pub struct FailingProvider {
    pub platform: Platform,
}

impl FailingProvider {
    pub fn new(platform: Platform) -> Arc<Self> {
        Arc::new(Self { platform })
    }
}

#[async_trait]
impl LeadProvider for FailingProvider {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn discover(&self, _criteria: &DiscoveryCriteria) -> Result<Vec<RawLead>, ProviderError> {
        Err(ProviderError::Request {
            platform: self.platform,
            message: "connection refused".to_string(),
        })
    }

    async fn enrich(
        &self,
        _lead: &Lead,
        _fields: &[EnrichmentField],
        _depth: u8,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::RateLimited {
            platform: self.platform,
        })
    }
}

/// Counts concurrent calls across every clone sharing the same gauge.
#[derive(Clone, Default)]
pub struct ConcurrencyGauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Simulated provider that takes `delay` per call and reports into a gauge.
pub struct SlowProvider {
    inner: SimulatedProvider,
    platform: Platform,
    delay: Duration,
    gauge: ConcurrencyGauge,
}

impl SlowProvider {
    pub fn new(platform: Platform, delay: Duration, gauge: ConcurrencyGauge) -> Arc<Self> {
        Arc::new(Self {
            inner: SimulatedProvider::new(platform, Duration::ZERO),
            platform,
            delay,
            gauge,
        })
    }
}

#[async_trait]
impl LeadProvider for SlowProvider {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn discover(&self, criteria: &DiscoveryCriteria) -> Result<Vec<RawLead>, ProviderError> {
        self.gauge.enter();
        tokio::time::sleep(self.delay).await;
        self.gauge.exit();
        self.inner.discover(criteria).await
    }

    async fn enrich(
        &self,
        lead: &Lead,
        fields: &[EnrichmentField],
        depth: u8,
    ) -> Result<Value, ProviderError> {
        self.gauge.enter();
        tokio::time::sleep(self.delay).await;
        self.gauge.exit();
        self.inner.enrich(lead, fields, depth).await
    }
}
