use crate::model::{Job, Lead};

use super::error::PipelineWarning;

pub struct PipelineContext {
    // Input
    pub job: Job,

    // Highest progress reached so far, carried across attempts.
    pub progress: u8,

    // Discovery + persistence result
    pub leads: Vec<Lead>,

    pub results_count: u32,

    // Whether the enrichment stage ran
    pub enriched: bool,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(job: Job) -> Self {
        let progress = job.progress;
        Self {
            job,
            progress,
            leads: Vec::new(),
            results_count: 0,
            enriched: false,
            warnings: Vec::new(),
        }
    }

    /// Fresh context for the next attempt of the same job.
    pub fn next_attempt(&self) -> Self {
        let mut ctx = Self::new(self.job.clone());
        ctx.progress = self.progress;
        ctx
    }
}
