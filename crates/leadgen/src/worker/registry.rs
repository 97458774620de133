//! In-flight job registry.
//!
//! Maps every job id with a running attempt to the token that cancels it.
//! Registration is exclusive: a second attempt for the same id is refused
//! while the first one's guard is alive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct ActiveJobs {
    jobs: Mutex<HashMap<String, CancellationToken>>,
}

impl ActiveJobs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.jobs.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Active job registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Registers `job_id`, or returns `None` if it is already running.
    pub fn try_register(self: &Arc<Self>, job_id: &str) -> Option<ActiveJobGuard> {
        let mut jobs = self.lock();
        if jobs.contains_key(job_id) {
            return None;
        }
        let token = CancellationToken::new();
        jobs.insert(job_id.to_string(), token.clone());
        Some(ActiveJobGuard {
            registry: Arc::clone(self),
            job_id: job_id.to_string(),
            token,
        })
    }

    /// Fires the cancellation token of a running job. Returns whether one
    /// was running.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.lock().get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.lock().contains_key(job_id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps a job registered; removes it on drop.
pub struct ActiveJobGuard {
    registry: Arc<ActiveJobs>,
    job_id: String,
    token: CancellationToken,
}

impl ActiveJobGuard {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.job_id);
    }
}
