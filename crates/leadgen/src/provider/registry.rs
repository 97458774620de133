//! Platform-keyed registry of providers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{LeadProvider, SimulatedProvider};
use crate::model::Platform;

/// Maps each platform to the provider serving it.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Platform, Arc<dyn LeadProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in simulated provider for every platform.
    pub fn simulated(latency: Duration) -> Self {
        let mut registry = Self::new();
        for platform in Platform::ALL {
            registry.register(Arc::new(SimulatedProvider::new(platform, latency)));
        }
        registry
    }

    /// Registers `provider` under its platform, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn LeadProvider>) -> &mut Self {
        let platform = provider.platform();
        if self.providers.insert(platform, provider).is_some() {
            tracing::debug!(platform = %platform, "replaced registered provider");
        }
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn LeadProvider>> {
        self.providers.get(&platform).cloned()
    }

    /// Registered platforms in declaration order.
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.providers.keys().copied().collect();
        platforms.sort();
        platforms
    }
}
