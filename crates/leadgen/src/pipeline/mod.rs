pub mod config;
pub mod context;
pub mod dedup;
pub mod enrichment;
pub mod error;
pub mod progress;
pub mod runner;
pub mod scoring;

pub use config::{IntensityProfile, PipelineConfig};
pub use context::PipelineContext;
pub use dedup::deduplicate;
pub use enrichment::{EnrichedLead, EnrichmentCoordinator, EnrichmentSummary};
pub use error::{PipelineError, PipelineWarning};
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::Pipeline;
pub use scoring::{score, ScoringStage};
