//! Shared utilities for leadgen integration tests.
//!
//! - `TestHarness`: file-backed store in a temp directory plus a wired `JobService`
//! - `ConfigBuilder`: fast test configurations (no pauses, no backoff)
//! - Scripted providers and a store wrapper that injects failures

pub mod builders;
pub mod flaky_store;
pub mod harness;
pub mod providers;

pub use builders::*;
pub use flaky_store::{FailPoint, FlakyStore};
pub use harness::TestHarness;
pub use providers::*;
