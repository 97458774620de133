//! Concurrency limit and at-most-one execution per job.

mod common;

use std::time::Duration;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use common::{registry_with, ConcurrencyGauge, ConfigBuilder, RequestBuilder, SlowProvider, TestHarness};
use leadgen::{Intensity, JobOutcome, JobStatus, LeadgenError, Platform};

fn slow_harness(limit: usize, delay: Duration, gauge: &ConcurrencyGauge) -> TestHarness {
    TestHarness::with_providers(
        registry_with(vec![SlowProvider::new(
            Platform::GoogleMaps,
            delay,
            gauge.clone(),
        )]),
        ConfigBuilder::new()
            .max_concurrent_jobs(limit)
            .query_secondary(false)
            .build(),
    )
}

fn small_request() -> leadgen::JobRequest {
    RequestBuilder::bakery()
        .max_results(5)
        .intensity(Intensity::Basic)
        .build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_inline_calls_respect_limit() {
    let gauge = ConcurrencyGauge::default();
    let harness = slow_harness(2, Duration::from_millis(100), &gauge);
    let ids: Vec<String> = (0..5).map(|_| harness.submit(small_request())).collect();

    let orchestrator = harness.service.orchestrator();
    let outcomes = join_all(ids.iter().map(|id| orchestrator.process_job(id))).await;

    for outcome in outcomes {
        assert_eq!(outcome.unwrap(), JobOutcome::Completed { results_count: 5 });
    }
    assert!(gauge.peak() <= 2, "peak concurrency was {}", gauge.peak());
    assert!(gauge.peak() >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_run_loop_processes_queue_within_limit() {
    let gauge = ConcurrencyGauge::default();
    let harness = slow_harness(2, Duration::from_millis(50), &gauge);
    let ids: Vec<String> = (0..6).map(|_| harness.submit(small_request())).collect();

    let shutdown = CancellationToken::new();
    let orchestrator = harness.service.orchestrator().clone();
    let loop_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { orchestrator.run(shutdown).await })
    };

    for id in &ids {
        harness.wait_for_status(id, JobStatus::Completed).await;
    }
    shutdown.cancel();
    loop_handle.await.unwrap().unwrap();

    assert!(gauge.peak() <= 2, "peak concurrency was {}", gauge.peak());
    let stats = harness.service.stats().unwrap();
    assert_eq!(stats.jobs.completed, 6);
    assert_eq!(stats.active_jobs, 0);
}

#[tokio::test]
async fn test_second_execution_of_same_job_is_refused() {
    let gauge = ConcurrencyGauge::default();
    let harness = slow_harness(5, Duration::from_millis(300), &gauge);
    let job_id = harness.submit(small_request());

    let orchestrator = harness.service.orchestrator().clone();
    let first = {
        let job_id = job_id.clone();
        tokio::spawn(async move { orchestrator.process_job(&job_id).await })
    };
    harness.wait_for_status(&job_id, JobStatus::Processing).await;

    let err = harness
        .service
        .orchestrator()
        .process_job(&job_id)
        .await
        .unwrap_err();
    assert!(matches!(err, LeadgenError::AlreadyActive(_)));
    assert_eq!(err.status_code(), 409);

    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome, JobOutcome::Completed { results_count: 5 });
    assert_eq!(gauge.peak(), 1);
}

#[tokio::test]
async fn test_health_reports_limit() {
    let gauge = ConcurrencyGauge::default();
    let harness = slow_harness(3, Duration::ZERO, &gauge);
    let health = harness.service.health();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_jobs, 0);
    assert_eq!(health.max_concurrent_jobs, 3);
}
