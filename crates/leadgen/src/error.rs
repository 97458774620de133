use std::path::PathBuf;
use thiserror::Error;

use crate::model::JobStatus;

#[derive(Error, Debug)]
pub enum LeadgenError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {id} is already {status}")]
    AlreadyTerminal { id: String, status: JobStatus },

    #[error("Job {0} is already being processed")]
    AlreadyActive(String),

    #[error("Job {id} is {status}; only completed or processing jobs can be exported")]
    NotExportable { id: String, status: JobStatus },
}

impl LeadgenError {
    /// HTTP-equivalent status code for reporting this error to a caller.
    pub fn status_code(&self) -> u16 {
        match self {
            LeadgenError::NotFound(_) => 404,
            LeadgenError::Validation(_)
            | LeadgenError::AlreadyTerminal { .. }
            | LeadgenError::NotExportable { .. } => 400,
            LeadgenError::AlreadyActive(_) => 409,
            LeadgenError::Config(_)
            | LeadgenError::Database(_)
            | LeadgenError::Store(_)
            | LeadgenError::Pipeline(_)
            | LeadgenError::Serialization(_)
            | LeadgenError::Csv(_)
            | LeadgenError::Io(_) => 500,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// A rejected job submission or query parameter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max} characters")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        max: u64,
        value: u64,
    },

    #[error("at most {max} keywords are allowed, got {count}")]
    TooManyKeywords { max: usize, count: usize },

    #[error("at least one platform is required")]
    NoPlatforms,

    #[error("{0}")]
    UnknownValue(#[from] crate::model::ParseEnumError),

    #[error("webhook_url must be an http(s) URL")]
    InvalidWebhookUrl,
}

pub type Result<T> = std::result::Result<T, LeadgenError>;
