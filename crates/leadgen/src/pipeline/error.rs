use thiserror::Error;

use crate::model::Platform;
use crate::provider::ProviderError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("Job was cancelled")]
    Cancelled,

    #[error("discovery returned no leads")]
    NoLeads,
}

impl PipelineError {
    /// Whether another attempt of the same job may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Store(_))
    }
}

/// Non-fatal problems collected while a job runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    DiscoveryFailed {
        platform: Platform,
        error: ProviderError,
    },
    ProviderMissing {
        platform: Platform,
    },
    EnrichmentFailed {
        lead_id: String,
        platform: Platform,
        error: ProviderError,
    },
    LeadTaskFailed {
        lead_id: String,
        error: String,
    },
}
