use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads `path` if given (defaults otherwise), then applies environment
/// overrides and validates the result.
pub fn resolve_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config)?;
    Ok(config)
}

/// Applies `LEADGEN_*` overrides looked up through `lookup`.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup("LEADGEN_DATABASE_PATH") {
        config.database_path = Some(path);
    }
    if let Some(value) = lookup("LEADGEN_MAX_CONCURRENT_JOBS") {
        config.orchestrator.max_concurrent_jobs = parse_env("LEADGEN_MAX_CONCURRENT_JOBS", &value)?;
    }
    if let Some(value) = lookup("LEADGEN_MAX_RETRIES") {
        config.retry.max_retries = parse_env("LEADGEN_MAX_RETRIES", &value)?;
    }
    if let Some(level) = lookup("LEADGEN_LOG_LEVEL") {
        config.logging.level = level.trim().to_lowercase();
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Validation {
        message: format!("Invalid value '{}' for {}: {}", value, key, e),
    })
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.orchestrator.max_concurrent_jobs == 0 {
        return Err(ConfigError::Validation {
            message: "orchestrator.max_concurrent_jobs must be greater than 0".to_string(),
        });
    }

    if config.orchestrator.poll_interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "orchestrator.poll_interval_ms must be greater than 0".to_string(),
        });
    }

    if config.retry.exponential && config.retry.max_backoff_ms < config.retry.backoff_ms {
        return Err(ConfigError::Validation {
            message: "retry.max_backoff_ms must not be below retry.backoff_ms".to_string(),
        });
    }

    if !["trace", "debug", "info", "warn", "error"].contains(&config.logging.level.as_str()) {
        return Err(ConfigError::Validation {
            message: format!("Unknown log level: {}", config.logging.level),
        });
    }

    Ok(())
}
