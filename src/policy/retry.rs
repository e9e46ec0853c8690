use rand::Rng;
use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::config::Config;
use crate::error::ApiFailure;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};

/// Retry configuration for idempotent reads. Pure function of attempt
/// count and error classification; nothing here touches HTTP.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fractional jitter applied to each delay; zero leaves the
    /// schedule exact.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_attempts: cfg.retry_max_attempts,
            base_delay_ms: cfg.retry_base_delay_ms,
            max_delay_ms: cfg.retry_max_delay_ms,
            jitter_factor: cfg.retry_jitter,
        }
    }

    /// Delay inserted before attempt `k` (1-based): base * 2^(k-1),
    /// clamped to the cap. The first attempt has no delay.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let pow = 2u64.saturating_pow((attempt - 1).min(31));
        let clamped = self.base_delay_ms.saturating_mul(pow).min(self.max_delay_ms);
        if self.jitter_factor > 0.0 {
            let range = clamped as f64 * self.jitter_factor;
            let jitter: f64 = rand::thread_rng().gen_range(-range..=range);
            Duration::from_millis((clamped as f64 + jitter).max(0.0) as u64)
        } else {
            Duration::from_millis(clamped)
        }
    }
}

/// Retry an idempotent read with exponential backoff. Retries only
/// failures classified as retryable; rate limits, validation errors,
/// timeouts and missing models return immediately.
pub async fn retry_read<F, Fut, T>(
    policy: &RetryPolicy,
    op_name: &str,
    mut op: F,
) -> Result<T, ApiFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiFailure>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last = ApiFailure::Unknown(format!("{}: no attempt made", op_name));
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(failure) => {
                if !failure.is_retryable() || attempt == attempts {
                    return Err(failure);
                }
                let delay = policy.delay_before(attempt + 1);
                log(
                    Level::Debug,
                    Domain::Request,
                    "retry",
                    obj(&[
                        ("op", v_str(op_name)),
                        ("attempt", v_num(attempt as f64)),
                        ("of", v_num(attempts as f64)),
                        ("delay_ms", v_num(delay.as_millis() as f64)),
                        ("error", v_str(&failure.to_string())),
                    ]),
                );
                sleep(delay).await;
                last = failure;
            }
        }
    }
    Err(last)
}
