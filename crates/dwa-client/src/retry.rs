//! Retry policy for the HTTP transport.
//!
//! Composition never retries. Only [`HttpTransport`](crate::HttpTransport)
//! consults this policy, after a retryable failure (timeouts, dropped
//! connections, 5xx, and Dataverse service-protection 429 responses).

use rand::Rng;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on computed backoff delays.
    pub max_delay: Duration,
    /// How delays grow between attempts.
    pub backoff: BackoffStrategy,
    /// Honor the server's `Retry-After` header when present.
    pub respect_retry_after: bool,
    /// Cap applied to `Retry-After` values.
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff: BackoffStrategy::ExponentialWithJitter { factor: 2.0 },
            respect_retry_after: true,
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Set the maximum number of retries.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the upper bound on backoff delays.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff strategy.
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Never retry.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    /// Preset for Dataverse service protection limits, which can ask
    /// callers to back off for up to five minutes.
    pub fn service_protection() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff: BackoffStrategy::ExponentialWithJitter { factor: 2.0 },
            respect_retry_after: true,
            max_retry_after: Duration::from_secs(300),
        }
    }
}

/// Backoff strategy for determining retry delays.
#[derive(Debug, Clone, Copy)]
pub enum BackoffStrategy {
    /// Same delay every time.
    Constant,
    /// `initial * (attempt + 1)`.
    Linear,
    /// `initial * factor^attempt`.
    Exponential { factor: f64 },
    /// Exponential plus a random jitter of up to one base delay.
    ExponentialWithJitter { factor: f64 },
}

impl BackoffStrategy {
    /// Delay for a 0-indexed attempt, capped at `max_delay`.
    pub fn delay(&self, attempt: u32, initial_delay: Duration, max_delay: Duration) -> Duration {
        let exponential = |factor: f64| initial_delay.as_secs_f64() * factor.powi(attempt as i32);

        let delay = match self {
            BackoffStrategy::Constant => initial_delay,
            BackoffStrategy::Linear => initial_delay.saturating_mul(attempt + 1),
            BackoffStrategy::Exponential { factor } => {
                Duration::from_secs_f64(exponential(*factor).min(max_delay.as_secs_f64()))
            }
            BackoffStrategy::ExponentialWithJitter { factor } => {
                let base = exponential(*factor).min(max_delay.as_secs_f64());
                let jitter = rand::rng().random::<f64>() * base;
                Duration::from_secs_f64(base + jitter)
            }
        };

        delay.min(max_delay)
    }
}

/// Tracks attempts for one logical request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempt: u32,
}

impl RetryPolicy {
    /// Start a fresh policy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Number of retries already scheduled.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns true while retries remain.
    pub fn should_retry(&self) -> bool {
        self.attempt < self.config.max_attempts
    }

    /// Consume one retry and return how long to wait before it, or `None`
    /// when the budget is spent. A server-provided `retry_after` wins over
    /// the backoff strategy when the config honors it.
    pub fn next_delay(&mut self, retry_after: Option<Duration>) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        let delay = match retry_after {
            Some(requested) if self.config.respect_retry_after => {
                requested.min(self.config.max_retry_after)
            }
            _ => self.config.backoff.delay(
                self.attempt,
                self.config.initial_delay,
                self.config.max_delay,
            ),
        };

        self.attempt += 1;
        Some(delay)
    }
}
