//! Bounded retry with configurable backoff.

use crate::metrics::record_counter;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    Fixed {
        #[serde(with = "humantime_serde")]
        delay: Duration,
    },
    /// `step * attempt`, never more than `cap`.
    Linear {
        #[serde(with = "humantime_serde")]
        step: Duration,
        #[serde(with = "humantime_serde")]
        cap: Duration,
    },
}

impl Backoff {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay } => delay,
            Backoff::Linear { step, cap } => step.saturating_mul(attempt).min(cap),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Upper bound of random delay added to each wait.
    #[serde(default, with = "humantime_serde")]
    pub jitter: Duration,
}

/// Returned when every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed { delay },
            jitter: Duration::ZERO,
        }
    }

    pub fn linear(max_attempts: u32, step: Duration, cap: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear { step, cap },
            jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = self.backoff.delay_for(attempt);
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }

    /// Run `op` until it succeeds or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. There is no wait after the
    /// last attempt.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        mut op: F,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max = self.attempts();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if attempt >= max => {
                    warn!(operation, attempts = attempt, error = %error, "giving up");
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: error,
                    });
                }
                Err(error) => {
                    let delay = self.delay_after(attempt);
                    record_counter("sync.retries", 1);
                    debug!(operation, attempt, ?delay, error = %error, "attempt failed; retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Poll `check` until it yields a value.
    ///
    /// `Ok(None)` means "not yet" and is retried; an `Err` aborts at once.
    /// Returns `Ok(None)` when attempts run out.
    pub async fn poll<T, E, F, Fut>(&self, operation: &str, mut check: F) -> Result<Option<T>, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let max = self.attempts();
        for attempt in 1..=max {
            if let Some(value) = check(attempt).await? {
                return Ok(Some(value));
            }
            if attempt < max {
                let delay = self.delay_after(attempt);
                debug!(operation, attempt, ?delay, "not ready; polling again");
                sleep(delay).await;
            }
        }
        warn!(operation, attempts = max, "polling gave up");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_linear_backoff_caps() {
        let backoff = Backoff::Linear {
            step: Duration::from_secs(2),
            cap: Duration::from_secs(10),
        };
        assert_eq!(backoff.delay_for(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(4), Duration::from_secs(8));
        assert_eq!(backoff.delay_for(9), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_bounded() {
        let policy =
            RetryPolicy::fixed(3, Duration::from_secs(1)).with_jitter(Duration::from_millis(250));
        for attempt in 1..20 {
            let delay = policy.delay_after(attempt);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_millis(1250));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_succeeds_on_third_attempt() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(2));
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let out = policy
            .run("mirror", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err("not yet")
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(out, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exhausts() {
        let policy = RetryPolicy::linear(3, Duration::from_secs(4), Duration::from_secs(60));
        let start = Instant::now();

        let out: Result<(), _> = policy.run("mirror", |_| async { Err("down") }).await;

        assert_eq!(
            out,
            Err(RetryExhausted {
                attempts: 3,
                last_error: "down"
            })
        );
        // 4s after the first failure, 8s after the second, none after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_bounded() {
        let policy = RetryPolicy::fixed(5, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let out: Result<Option<u8>, &str> = policy
            .poll("identity", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(None) }
            })
            .await;

        assert_eq!(out, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_aborts() {
        let policy = RetryPolicy::fixed(5, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let out: Result<Option<u8>, &str> = policy
            .poll("identity", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("rpc down") }
            })
            .await;

        assert_eq!(out, Err("rpc down"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_toml_shape() {
        let policy: RetryPolicy = toml::from_str(
            r#"
            max_attempts = 10
            backoff = { kind = "linear", step = "2s", cap = "10s" }
            "#,
        )
        .unwrap();
        assert_eq!(
            policy,
            RetryPolicy::linear(10, Duration::from_secs(2), Duration::from_secs(10))
        );
    }
}
