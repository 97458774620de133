//! Batched, per-lead fault-isolated enrichment.
//!
//! Leads are processed in batches sized by the intensity profile. Every lead
//! of a batch runs as its own task; within a lead the requested platforms are
//! attempted one after another and a failing platform only loses its own
//! contribution. A fixed pause separates batches.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::model::{EnrichmentRecord, Lead, Platform};
use crate::provider::{EnrichmentField, LeadProvider, ProviderRegistry};

use super::config::IntensityProfile;
use super::error::{PipelineError, PipelineWarning};
use super::scoring::{score, ScoringStage};

/// A lead after its enrichment attempt plus one record per successful platform.
#[derive(Debug, Clone)]
pub struct EnrichedLead {
    pub lead: Lead,
    pub records: Vec<EnrichmentRecord>,
}

#[derive(Debug, Default)]
pub struct EnrichmentSummary {
    /// Leads whose task finished, with or without platform failures.
    pub processed: usize,
    /// Successful platform payloads across all leads.
    pub payloads: usize,
    pub warnings: Vec<PipelineWarning>,
}

pub struct EnrichmentCoordinator {
    registry: ProviderRegistry,
    batch_pause: Duration,
}

struct LeadTask {
    providers: Vec<Arc<dyn LeadProvider>>,
    fields: Vec<EnrichmentField>,
    depth: u8,
    data_type: String,
}

impl EnrichmentCoordinator {
    pub fn new(registry: ProviderRegistry, batch_pause: Duration) -> Self {
        Self {
            registry,
            batch_pause,
        }
    }

    /// Enriches `leads` against `platforms`. `on_batch` receives every
    /// finished batch so the caller can persist it before the next one
    /// starts.
    pub async fn enrich<F>(
        &self,
        leads: &[Lead],
        platforms: &[Platform],
        profile: &IntensityProfile,
        cancel: &CancellationToken,
        mut on_batch: F,
    ) -> Result<EnrichmentSummary, PipelineError>
    where
        F: FnMut(&[EnrichedLead]) -> Result<(), PipelineError>,
    {
        let mut summary = EnrichmentSummary::default();

        let mut providers = Vec::with_capacity(platforms.len());
        for &platform in platforms {
            match self.registry.get(platform) {
                Some(provider) => providers.push(provider),
                None => {
                    warn!(platform = %platform, "No provider registered, skipping platform");
                    summary
                        .warnings
                        .push(PipelineWarning::ProviderMissing { platform });
                }
            }
        }

        let task = Arc::new(LeadTask {
            providers,
            fields: profile.fields.clone(),
            depth: profile.depth,
            data_type: profile.data_type(),
        });

        let batch_size = profile.concurrency.max(1);
        let batch_count = leads.len().div_ceil(batch_size);

        for (index, batch) in leads.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let handles: Vec<_> = batch
                .iter()
                .map(|lead| tokio::spawn(enrich_lead(lead.clone(), Arc::clone(&task))))
                .collect();
            let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

            let results = tokio::select! {
                _ = cancel.cancelled() => {
                    for abort in aborts {
                        abort.abort();
                    }
                    return Err(PipelineError::Cancelled);
                }
                results = join_all(handles) => results,
            };

            let mut finished = Vec::with_capacity(results.len());
            for (lead, result) in batch.iter().zip(results) {
                match result {
                    Ok((enriched, warnings)) => {
                        summary.payloads += enriched.records.len();
                        summary.warnings.extend(warnings);
                        finished.push(enriched);
                    }
                    Err(e) => {
                        warn!(lead_id = %lead.id, error = %e, "Enrichment task failed, lead left unchanged");
                        summary.warnings.push(PipelineWarning::LeadTaskFailed {
                            lead_id: lead.id.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }

            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            summary.processed += finished.len();
            on_batch(&finished)?;
            debug!(
                batch = index + 1,
                batches = batch_count,
                leads = finished.len(),
                "Enrichment batch done"
            );

            if index + 1 < batch_count && !self.batch_pause.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                    _ = tokio::time::sleep(self.batch_pause) => {}
                }
            }
        }

        Ok(summary)
    }
}

async fn enrich_lead(mut lead: Lead, task: Arc<LeadTask>) -> (EnrichedLead, Vec<PipelineWarning>) {
    let mut warnings = Vec::new();
    let mut payloads = Vec::new();

    for provider in &task.providers {
        let platform = provider.platform();
        match provider.enrich(&lead, &task.fields, task.depth).await {
            Ok(payload) => {
                lead.enrichment_data.insert(platform, payload.clone());
                payloads.push((platform, payload));
            }
            Err(error) => {
                warn!(lead_id = %lead.id, platform = %platform, error = %error, "Platform enrichment failed");
                warnings.push(PipelineWarning::EnrichmentFailed {
                    lead_id: lead.id.clone(),
                    platform,
                    error,
                });
            }
        }
    }

    let scores = score(&lead, ScoringStage::Incremental);
    lead.apply_scores(scores);
    lead.updated_at = Utc::now();

    let records = payloads
        .into_iter()
        .map(|(platform, payload)| {
            let mut record = EnrichmentRecord::new(&lead.id, platform, &task.data_type, payload);
            record.confidence = Some(scores.confidence_score);
            record
        })
        .collect();

    (EnrichedLead { lead, records }, warnings)
}
