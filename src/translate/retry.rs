use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, SubflowError};
use super::{Oracle, OracleRequest};

/// Backoff schedule for a failing oracle call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per batch; 0 retries forever
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_secs(10),
            multiplier: 2.0,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Fixed delay, never gives up
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: 0,
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
        }
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts != 0 && attempts >= self.max_attempts
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Result of a successful oracle call
#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
    pub text: String,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

impl Translated {
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Call the oracle until it answers, the policy gives up, or the job is cancelled.
///
/// Both the in-flight call and the backoff sleep race the cancellation token.
pub async fn translate_with_retry(
    oracle: &dyn Oracle,
    request: &OracleRequest,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Translated> {
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SubflowError::Cancelled),
            result = oracle.translate(request) => result,
        };

        let error = match outcome {
            Ok(text) if !text.trim().is_empty() => {
                debug!("Oracle answered on attempt {}", attempt);
                return Ok(Translated { text, attempts: attempt });
            }
            Ok(_) => SubflowError::Translation("Empty translation received".to_string()),
            Err(e) => e,
        };

        if policy.is_exhausted(attempt) {
            warn!("Giving up on oracle after {} attempts: {}", attempt, error);
            return Err(SubflowError::OracleUnavailable {
                attempts: attempt,
                last_error: error.to_string(),
            });
        }

        let delay = policy.delay_after(attempt);
        warn!("Translation error, retrying in {:?} (attempt {}): {}", delay, attempt, error);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SubflowError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
