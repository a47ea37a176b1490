//! Bounded retry policies.
//!
//! A [`RetryPolicy`] only answers two questions: may another attempt be
//! made after `n` failures, and how long to wait before it. Callers decide
//! which errors are retryable. Waiting goes through a [`Sleeper`] so tests
//! can observe delays without spending them.

use std::time::Duration;

use async_trait::async_trait;

/// How the delay grows with the number of failures so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failure.
    Fixed(Duration),
    /// `failures × step`.
    Linear(Duration),
    /// `initial × 2^(failures-1)`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Paginated source fetches: 3 attempts, waiting 10s, then 20s.
    pub fn fetch() -> Self {
        Self::new(3, Backoff::Linear(Duration::from_secs(10)))
    }

    /// Ticket creation at the destination: 3 attempts, 5s apart.
    pub fn ticket_post() -> Self {
        Self::new(3, Backoff::Fixed(Duration::from_secs(5)))
    }

    /// Ticket note queries: 5 attempts, exponential from 1s up to 60s.
    pub fn notes() -> Self {
        Self::new(
            5,
            Backoff::Exponential {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(60),
            },
        )
    }

    /// Whether another attempt is allowed after `failures` failed ones.
    pub fn should_retry(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }

    /// Delay to wait after the `failures`-th failure (1-based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let failures = failures.max(1);
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(step) => step.saturating_mul(failures),
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(failures - 1);
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Something that can wait.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock waiting on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_policy_is_linear() {
        let policy = RetryPolicy::fetch();
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2), Duration::from_secs(20));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_ticket_post_policy_is_fixed() {
        let policy = RetryPolicy::ticket_post();
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(5));
        assert_eq!(policy.max_attempts, 3);
    }

    #[test]
    fn test_exponential_caps_at_max() {
        let policy = RetryPolicy::notes();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), Duration::from_secs(60));
        assert_eq!(policy.delay_for(40), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_failures_treated_as_first() {
        let policy = RetryPolicy::fetch();
        assert_eq!(policy.delay_for(0), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_waits() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(5)).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
