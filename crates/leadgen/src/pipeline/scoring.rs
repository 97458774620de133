//! Lead scoring.
//!
//! Scores are pure functions of a lead's contact fields and the set of
//! platforms in its enrichment data; they are always recomputed, never patched.

use crate::model::{Lead, LeadScores};

const CONTACT_FIELD_COUNT: f64 = 6.0;
const PLATFORM_BONUS: f64 = 0.1;
const MAX_PLATFORM_POINTS: usize = 20;

/// Which confidence formula applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringStage {
    /// Mandatory pass after enrichment; these are the persisted scores.
    Final,
    /// Intermediate scores written while enrichment runs.
    Incremental,
}

pub fn score(lead: &Lead, stage: ScoringStage) -> LeadScores {
    let filled = lead
        .contact_fields()
        .iter()
        .filter(|f| f.is_some_and(|v| !v.trim().is_empty()))
        .count();
    let platforms = lead.enrichment_data.len();

    let base = filled as f64 / CONTACT_FIELD_COUNT;
    let completeness = (base + PLATFORM_BONUS * platforms as f64).min(1.0);

    let points = (completeness * 100.0).round() as usize + platforms.min(MAX_PLATFORM_POINTS);
    let quality = points.min(100) as u8;

    let confidence = match stage {
        ScoringStage::Final => {
            if quality > 70 {
                0.8
            } else {
                0.6
            }
        }
        ScoringStage::Incremental => (0.6 + 0.1 * platforms as f64).min(0.95),
    };

    LeadScores {
        quality_score: quality,
        completeness_score: completeness,
        confidence_score: confidence,
    }
}
