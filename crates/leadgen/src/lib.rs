pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod service;
pub mod store;
pub mod webhook;
pub mod worker;

pub use config::{load_config, resolve_config, Config};
pub use error::{ConfigError, LeadgenError, Result, ValidationError};
pub use export::{ExportFormat, ExportedResults};
pub use model::{Intensity, Job, JobParams, JobStatus, Lead, Platform};
pub use service::{JobRequest, JobService};
pub use store::{JobStore, SqliteJobStore, StoreError};
pub use worker::{JobOutcome, Orchestrator};
