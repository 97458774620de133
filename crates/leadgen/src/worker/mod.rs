pub mod orchestrator;
pub mod registry;
pub mod retry;

pub use orchestrator::{HealthStatus, JobOutcome, Orchestrator};
pub use registry::{ActiveJobGuard, ActiveJobs};
pub use retry::RetryPolicy;
