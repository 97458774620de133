use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::broadcast::job_progress::JobStage;
use crate::config::ZeroResultsPolicy;
use crate::model::{Lead, Platform, RawLead};
use crate::provider::{DiscoveryCriteria, ProviderRegistry};
use crate::store::JobStore;

use super::config::{IntensityProfile, PipelineConfig};
use super::context::PipelineContext;
use super::dedup::deduplicate;
use super::enrichment::EnrichmentCoordinator;
use super::error::{PipelineError, PipelineWarning};
use super::progress::{ProgressEvent, ProgressReporter};
use super::scoring::{score, ScoringStage};

pub const PROGRESS_DISCOVERED: u8 = 30;
pub const PROGRESS_PERSISTED: u8 = 40;
pub const PROGRESS_ENRICHED: u8 = 80;
pub const PROGRESS_SCORED: u8 = 90;

/// Runs the discovery, persistence, enrichment and scoring steps of one job
/// attempt. Status transitions around an attempt belong to the orchestrator.
pub struct Pipeline {
    store: Arc<dyn JobStore>,
    providers: ProviderRegistry,
    enrichment: EnrichmentCoordinator,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(store: Arc<dyn JobStore>, providers: ProviderRegistry, config: PipelineConfig) -> Self {
        let enrichment = EnrichmentCoordinator::new(providers.clone(), config.batch_pause);
        Self {
            store,
            providers,
            enrichment,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs one attempt for a job already in Processing. Returns the number of
    /// persisted leads.
    pub async fn run(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<u32, PipelineError> {
        let span = info_span!("pipeline",
            job_id = %ctx.job.id,
            industry = %ctx.job.params.industry,
            intensity = %ctx.job.params.intensity,
        );

        async {
            // Step 1: Discover
            let discovered = self
                .step_discover(ctx, progress, cancel)
                .instrument(info_span!("discover"))
                .await?;

            // Step 2: Persist
            {
                let _step = info_span!("persist").entered();
                self.step_persist(ctx, discovered, progress, cancel)?;
            }

            // Step 3: Enrich
            if ctx.job.params.needs_enrichment() {
                self.step_enrich(ctx, progress, cancel)
                    .instrument(info_span!("enrich"))
                    .await?;
            }

            // Step 4: Score
            {
                let _step = info_span!("score").entered();
                self.step_score(ctx, progress, cancel)?;
            }

            info!(
                results = ctx.results_count,
                warnings = ctx.warnings.len(),
                "Pipeline attempt finished"
            );
            Ok(ctx.results_count)
        }
        .instrument(span)
        .await
    }

    fn checkpoint(cancel: &CancellationToken) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Writes `value` as the job's progress. A rejected write means the job
    /// left Processing, which only cancellation does mid-attempt.
    fn advance(&self, ctx: &mut PipelineContext, value: u8) -> Result<(), PipelineError> {
        if !self.store.update_progress(&ctx.job.id, value)? {
            return Err(PipelineError::Cancelled);
        }
        ctx.progress = ctx.progress.max(value);
        Ok(())
    }

    async fn step_discover(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawLead>, PipelineError> {
        Self::checkpoint(cancel)?;
        let primary = self.config.primary_platform;
        progress.report(ProgressEvent::Stage {
            stage: JobStage::Discovery,
            progress: ctx.progress,
            message: format!("Discovering leads on {}", primary),
        });

        let criteria = DiscoveryCriteria::from_params(&ctx.job.params);
        let max_results = ctx.job.params.max_results as usize;

        let mut found = self.discover_on(primary, &criteria, ctx, cancel).await?;

        if found.len() < max_results {
            if let Some(secondary) = self.config.secondary_platform {
                let remaining = (max_results - found.len()) as u32;
                debug!(
                    found = found.len(),
                    platform = %secondary,
                    "Primary under-filled, querying secondary platform"
                );
                let extra = self
                    .discover_on(secondary, &criteria.with_max_results(remaining), ctx, cancel)
                    .await?;
                found.extend(extra);
            }
        }

        let total = found.len();
        let unique = deduplicate(found, max_results);
        info!(discovered = total, unique = unique.len(), "Discovery done");

        if unique.is_empty() && self.config.zero_results_policy == ZeroResultsPolicy::Fail {
            return Err(PipelineError::NoLeads);
        }

        self.advance(ctx, PROGRESS_DISCOVERED)?;
        progress.report(ProgressEvent::Results {
            stage: JobStage::Discovery,
            progress: ctx.progress,
            results_count: unique.len() as u32,
            message: format!("Discovered {} unique leads", unique.len()),
        });
        Ok(unique)
    }

    /// Provider failures are recorded as warnings and yield no records.
    async fn discover_on(
        &self,
        platform: Platform,
        criteria: &DiscoveryCriteria,
        ctx: &mut PipelineContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawLead>, PipelineError> {
        let Some(provider) = self.providers.get(platform) else {
            warn!(platform = %platform, "No provider registered for discovery");
            ctx.warnings
                .push(PipelineWarning::ProviderMissing { platform });
            return Ok(Vec::new());
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            result = provider.discover(criteria) => result,
        };

        match result {
            Ok(mut records) => {
                for record in &mut records {
                    record.source_platform.get_or_insert(platform);
                }
                debug!(platform = %platform, count = records.len(), "Provider returned records");
                Ok(records)
            }
            Err(error) => {
                warn!(platform = %platform, error = %error, "Discovery failed, continuing without it");
                ctx.warnings
                    .push(PipelineWarning::DiscoveryFailed { platform, error });
                Ok(Vec::new())
            }
        }
    }

    fn step_persist(
        &self,
        ctx: &mut PipelineContext,
        discovered: Vec<RawLead>,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        Self::checkpoint(cancel)?;
        progress.report(ProgressEvent::Stage {
            stage: JobStage::Persisting,
            progress: ctx.progress,
            message: "Saving leads".to_string(),
        });

        let job_id = ctx.job.id.clone();
        let leads: Vec<Lead> = discovered
            .into_iter()
            .map(|raw| Lead::from_raw(&job_id, raw, self.config.primary_platform))
            .collect();

        let persisted = self.store.replace_leads(&job_id, &leads)? as u32;
        if !self.store.set_results_count(&job_id, persisted)? {
            return Err(PipelineError::Cancelled);
        }
        ctx.results_count = persisted;
        ctx.leads = leads;

        self.advance(ctx, PROGRESS_PERSISTED)?;
        progress.report(ProgressEvent::Results {
            stage: JobStage::Persisting,
            progress: ctx.progress,
            results_count: persisted,
            message: format!("Saved {} leads", persisted),
        });
        Ok(())
    }

    async fn step_enrich(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        Self::checkpoint(cancel)?;
        let params = &ctx.job.params;
        let platforms = params.enrichment_platforms(self.config.primary_platform);
        let profile = IntensityProfile::for_intensity(params.intensity);

        progress.report(ProgressEvent::Stage {
            stage: JobStage::Enriching,
            progress: ctx.progress,
            message: format!(
                "Enriching {} leads at {} intensity",
                ctx.leads.len(),
                params.intensity
            ),
        });

        if platforms.is_empty() || ctx.leads.is_empty() {
            debug!("Nothing to enrich");
        } else {
            let store = &self.store;
            let summary = self
                .enrichment
                .enrich(&ctx.leads, &platforms, &profile, cancel, |batch| {
                    for enriched in batch {
                        store.save_enrichment(&enriched.lead, &enriched.records)?;
                    }
                    Ok(())
                })
                .await?;
            info!(
                leads = summary.processed,
                payloads = summary.payloads,
                "Enrichment done"
            );
            ctx.warnings.extend(summary.warnings);
        }
        ctx.enriched = true;

        self.advance(ctx, PROGRESS_ENRICHED)?;
        progress.report(ProgressEvent::Stage {
            stage: JobStage::Enriching,
            progress: ctx.progress,
            message: "Enrichment finished".to_string(),
        });
        Ok(())
    }

    fn step_score(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        Self::checkpoint(cancel)?;
        progress.report(ProgressEvent::Stage {
            stage: JobStage::Scoring,
            progress: ctx.progress,
            message: "Scoring leads".to_string(),
        });

        let mut leads = self.store.leads_for_job(&ctx.job.id)?;
        for lead in &mut leads {
            let scores = score(lead, ScoringStage::Final);
            self.store.save_scores(&lead.id, &scores)?;
            lead.apply_scores(scores);
        }
        ctx.leads = leads;

        self.advance(ctx, PROGRESS_SCORED)?;
        progress.report(ProgressEvent::Stage {
            stage: JobStage::Scoring,
            progress: ctx.progress,
            message: format!("Scored {} leads", ctx.leads.len()),
        });
        Ok(())
    }
}
