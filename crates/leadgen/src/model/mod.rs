//! Domain types shared by every stage of the engine.

pub mod job;
pub mod lead;
pub mod platform;

use thiserror::Error;

pub use job::{Job, JobParams, JobStatus};
pub use lead::{EnrichmentData, EnrichmentRecord, Lead, LeadScores, RawLead};
pub use platform::{Intensity, Platform};

/// Returned when a string does not name a known enum value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
