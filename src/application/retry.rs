//! Bounded exponential backoff with jitter around a single provider call.

use crate::domain::error::{FetchError, RetryError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Delays are scaled by a uniform factor in [1 - j, 1 + j].
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            jitter_fraction: 0.1,
        }
    }
}

impl RetryConfig {
    /// No sleeping between attempts. Used by tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_fraction: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        let mut config = config;
        config.max_attempts = config.max_attempts.max(1);
        config.jitter_fraction = config.jitter_fraction.clamp(0.0, 1.0);
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Pre-jitter delay after failed attempt `attempt` (1-indexed):
    /// `min(max_delay, base_delay * 2^(attempt-1))`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exp;
        self.config
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay)
    }

    /// Pre-jitter schedule for every attempt the policy allows.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.config.max_attempts)
            .map(|k| self.base_delay_for(k))
            .collect()
    }

    pub fn jittered_delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for(attempt);
        let j = self.config.jitter_fraction;
        if j == 0.0 || base.is_zero() {
            return base;
        }
        let factor = rand::thread_rng().gen_range((1.0 - j)..=(1.0 + j));
        base.mul_f64(factor)
    }

    /// Run `op` until it succeeds, fails with a permanent kind, or the
    /// attempt budget is spent. Only the calling task sleeps between
    /// attempts.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max = self.config.max_attempts;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.kind.is_transient() => {
                    tracing::debug!(%label, attempt, error = %e, "permanent failure, not retrying");
                    return Err(RetryError { attempts: attempt, last: e });
                }
                Err(e) if attempt >= max => {
                    tracing::warn!(%label, attempt, max, error = %e, "retries exhausted");
                    return Err(RetryError { attempts: attempt, last: e });
                }
                Err(e) => {
                    let delay = self.jittered_delay_for(attempt);
                    tracing::warn!(
                        %label,
                        attempt,
                        max,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
