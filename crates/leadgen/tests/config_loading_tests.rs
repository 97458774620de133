//! Loading config files and wiring a service from them.

use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use leadgen::config::{load_config, resolve_config, ZeroResultsPolicy};
use leadgen::{ConfigError, JobRequest, JobService, JobStatus, Platform};

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("leadgen.json");
    fs::write(&path, body).expect("Failed to write config");
    path
}

#[test]
fn test_service_from_config_file() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("data").join("jobs.db");
    let path = write_config(
        &dir,
        &format!(
            r#"{{
                "version": "1.0",
                "database_path": {db},
                "orchestrator": {{ "max_concurrent_jobs": 2 }},
                "pipeline": {{ "zero_results_policy": "fail", "batch_pause_ms": 0 }}
            }}"#,
            db = serde_json::to_string(&db_path.to_string_lossy()).unwrap()
        ),
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.orchestrator.max_concurrent_jobs, 2);
    assert_eq!(config.pipeline.zero_results_policy, ZeroResultsPolicy::Fail);

    let service = JobService::from_config(&config).unwrap();
    assert!(db_path.exists());
    assert_eq!(service.health().max_concurrent_jobs, 2);

    let submitted = service
        .submit(JobRequest::new("florist", "Portland, OR"))
        .unwrap();
    assert_eq!(submitted.status, JobStatus::Queued);

    // A second service on the same file sees the job.
    let reopened = JobService::from_config(&config).unwrap();
    let view = reopened.status(&submitted.job_id).unwrap();
    assert_eq!(view.job.params.platforms, vec![Platform::GoogleMaps]);
}

#[test]
fn test_schema_errors_are_reported() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{ "version": "1.0", "pipeline": { "secondary_platform": "myspace" } }"#,
    );
    let err = load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigError::SchemaValidation { .. }));
}

#[test]
#[serial]
fn test_environment_overrides_file_values() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{ "version": "1.0", "retry": { "max_retries": 1 } }"#);

    std::env::set_var("LEADGEN_MAX_RETRIES", "7");
    let config = resolve_config(Some(&path));
    std::env::remove_var("LEADGEN_MAX_RETRIES");

    assert_eq!(config.unwrap().retry.max_retries, 7);
}

#[test]
#[serial]
fn test_invalid_environment_value_is_rejected() {
    std::env::set_var("LEADGEN_MAX_CONCURRENT_JOBS", "0");
    let result = resolve_config(None);
    std::env::remove_var("LEADGEN_MAX_CONCURRENT_JOBS");

    assert!(matches!(result, Err(ConfigError::Validation { .. })));
}
