use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::ApiFailure;

/// Shared 429 cooldown. One rate-limited response pauses every caller;
/// attempts inside the cooldown fail fast as rate-limited without
/// touching the network.
pub struct RateLimitGate {
    cooldown: Duration,
    limited_at: Mutex<Option<Instant>>,
}

impl RateLimitGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            limited_at: Mutex::new(None),
        }
    }

    pub fn record(&self) {
        *self.limited_at.lock().expect("rate gate poisoned") = Some(Instant::now());
    }

    /// Records the cooldown iff the failure was a rate limit.
    pub fn observe(&self, failure: &ApiFailure) {
        if failure.is_rate_limited() {
            self.record();
        }
    }

    /// Time left on the cooldown, if any.
    pub fn remaining(&self) -> Option<Duration> {
        let guard = self.limited_at.lock().expect("rate gate poisoned");
        let at = (*guard)?;
        let elapsed = at.elapsed();
        if elapsed < self.cooldown {
            Some(self.cooldown - elapsed)
        } else {
            None
        }
    }

    pub fn check(&self) -> Result<(), ApiFailure> {
        match self.remaining() {
            Some(_) => Err(ApiFailure::RateLimited),
            None => Ok(()),
        }
    }
}
