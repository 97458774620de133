//! Process-wide tracing setup.

use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LoggingConfig;

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Builds the filter: `RUST_LOG` when set, the configured level otherwise.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,leadgen={}", config.level))
    })
}

/// Installs the global subscriber and forwards `log` records into it.
/// Returns `false` when logging was already set up.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let mut installed_now = false;
    INSTALLED.get_or_init(|| {
        let json = config.json;
        let subscriber = Registry::default()
            .with(env_filter(config))
            .with(json.then(|| fmt::layer().json().with_target(true)))
            .with((!json).then(|| fmt::layer().with_target(false)));

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            return false;
        }
        if let Err(e) = tracing_log::LogTracer::init() {
            tracing::warn!(error = %e, "log records will not be captured");
        }
        installed_now = true;
        true
    });
    installed_now
}
