//! Retry policy
//!
//! Bounded retries with a growing, capped backoff for remote calls.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry budget for one kind of remote call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Retries after the first attempt
    pub retries: u32,

    /// Backoff before the first retry, in milliseconds
    pub min_timeout_ms: u64,

    /// Upper bound for any backoff, in milliseconds
    pub max_timeout_ms: u64,

    /// Backoff growth per attempt
    pub factor: f64,

    /// Multiply each backoff by a random factor in [1, 2)
    pub randomize: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retries: 5,
            min_timeout_ms: 1_000,
            max_timeout_ms: 10_000,
            factor: 2.0,
            randomize: false,
        }
    }
}

impl RetryOptions {
    pub fn new(retries: u32, min_timeout: Duration, max_timeout: Duration) -> Self {
        Self {
            retries,
            min_timeout_ms: min_timeout.as_millis() as u64,
            max_timeout_ms: max_timeout.as_millis() as u64,
            ..Default::default()
        }
    }

    /// Page discovery budget: 5 retries, 5s to 10s
    pub fn discovery() -> Self {
        Self::new(5, Duration::from_secs(5), Duration::from_secs(10))
    }

    /// Test execution budget: 5 retries, 10s to 30s
    pub fn test_execution() -> Self {
        Self::new(5, Duration::from_secs(10), Duration::from_secs(30))
    }

    pub fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Backoff before retry number `attempt` (0-indexed)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = if self.factor < 1.0 { 1.0 } else { self.factor };
        let exp = factor.powi(attempt.min(i32::MAX as u32) as i32);
        let mut millis = self.min_timeout_ms as f64 * exp;

        if self.randomize {
            millis *= rand::rng().random_range(1.0..2.0);
        }

        let capped = millis.min(self.max_timeout_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Run `operation` until it succeeds or the retry budget is spent.
///
/// Every failed attempt except the last is logged and followed by a backoff.
/// The last error is returned unchanged.
pub async fn with_retry<F, Fut, T, E>(
    label: &str,
    options: &RetryOptions,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = options.max_attempts();
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{}: succeeded after {} retries", label, attempt);
                }
                return Ok(value);
            }
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    warn!("{}: giving up after {} attempts: {}", label, attempt, err);
                    return Err(err);
                }

                let backoff = options.backoff(attempt - 1);
                warn!(
                    "{}: attempt {}/{} failed: {}, retrying in {:?}",
                    label, attempt, max_attempts, err, backoff
                );
                sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let options = RetryOptions::new(5, Duration::from_secs(10), Duration::from_secs(30));

        assert_eq!(options.backoff(0), Duration::from_secs(10));
        assert_eq!(options.backoff(1), Duration::from_secs(20));
        assert_eq!(options.backoff(2), Duration::from_secs(30));
        assert_eq!(options.backoff(10), Duration::from_secs(30));
    }

    #[test]
    fn test_randomized_backoff_stays_in_bounds() {
        let options = RetryOptions::discovery().with_randomize(true);

        for attempt in 0..8 {
            let backoff = options.backoff(attempt);
            assert!(backoff >= Duration::from_secs(5));
            assert!(backoff <= Duration::from_secs(10));
        }
    }

    #[test]
    fn test_default_budgets() {
        let discovery = RetryOptions::discovery();
        assert_eq!(discovery.retries, 5);
        assert_eq!(discovery.min_timeout_ms, 5_000);
        assert_eq!(discovery.max_timeout_ms, 10_000);

        let execution = RetryOptions::test_execution();
        assert_eq!(execution.min_timeout_ms, 10_000);
        assert_eq!(execution.max_timeout_ms, 30_000);
        assert_eq!(execution.max_attempts(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<u32, anyhow::Error> =
            with_retry("first", &RetryOptions::discovery(), || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_from_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = with_retry("flaky", &RetryOptions::test_execution(), || {
            let calls = Arc::clone(&calls);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(anyhow!("connection reset"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_exhausts_exactly_retries_plus_one() {
        for retries in [0, 1, 5] {
            let calls = Arc::new(AtomicU32::new(0));
            let options =
                RetryOptions::new(retries, Duration::from_millis(10), Duration::from_millis(50));

            let result: Result<(), String> = with_retry("broken", &options, || {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    Err(format!("failure {n}"))
                }
            })
            .await;

            assert_eq!(result.unwrap_err(), format!("failure {retries}"));
            assert_eq!(calls.load(Ordering::SeqCst), retries + 1);
        }
    }
}
