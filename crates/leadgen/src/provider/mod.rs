//! Discovery and enrichment providers.
//!
//! A provider wraps one external platform. Calls are independently fallible:
//! a [`ProviderError`] is always local to the call that produced it.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{JobParams, Lead, Platform, RawLead};

pub mod registry;
pub mod simulated;

pub use registry::ProviderRegistry;
pub use simulated::SimulatedProvider;

/// Errors from a single provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Request to {platform} failed: {message}")]
    Request { platform: Platform, message: String },

    #[error("Could not parse {platform} response: {message}")]
    Parse { platform: Platform, message: String },

    #[error("Rate limited by {platform}")]
    RateLimited { platform: Platform },

    #[error("{platform} does not support {operation}")]
    Unsupported {
        platform: Platform,
        operation: &'static str,
    },
}

/// Search parameters handed to discovery providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryCriteria {
    pub industry: String,
    pub location: String,
    pub radius: u32,
    pub max_results: u32,
    pub keywords: Vec<String>,
    pub job_title: Option<String>,
}

impl DiscoveryCriteria {
    pub fn from_params(params: &JobParams) -> Self {
        Self {
            industry: params.industry.clone(),
            location: params.location.clone(),
            radius: params.radius,
            max_results: params.max_results,
            keywords: params.keywords.clone(),
            job_title: params.job_title.clone(),
        }
    }

    /// Same search with a different result cap.
    pub fn with_max_results(&self, max_results: u32) -> Self {
        Self {
            max_results,
            ..self.clone()
        }
    }
}

/// Field group an enrichment call asks a provider for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentField {
    BasicInfo,
    ContactInfo,
    SocialProfiles,
    ContentAnalysis,
    NetworkData,
}

impl EnrichmentField {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentField::BasicInfo => "basic_info",
            EnrichmentField::ContactInfo => "contact_info",
            EnrichmentField::SocialProfiles => "social_profiles",
            EnrichmentField::ContentAnalysis => "content_analysis",
            EnrichmentField::NetworkData => "network_data",
        }
    }
}

impl fmt::Display for EnrichmentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One external platform able to discover and/or enrich leads.
///
/// Both capabilities default to [`ProviderError::Unsupported`], so a provider
/// only implements what its platform offers.
#[async_trait]
pub trait LeadProvider: Send + Sync {
    fn platform(&self) -> Platform;

    async fn discover(&self, criteria: &DiscoveryCriteria) -> Result<Vec<RawLead>, ProviderError> {
        let _ = criteria;
        Err(ProviderError::Unsupported {
            platform: self.platform(),
            operation: "discovery",
        })
    }

    async fn enrich(
        &self,
        lead: &Lead,
        fields: &[EnrichmentField],
        depth: u8,
    ) -> Result<serde_json::Value, ProviderError> {
        let _ = (lead, fields, depth);
        Err(ProviderError::Unsupported {
            platform: self.platform(),
            operation: "enrichment",
        })
    }
}
