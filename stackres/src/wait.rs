//! Bounded polling for eventually consistent changes.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Default delay between polls.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
/// Default number of polls before giving up.
pub const DEFAULT_ATTEMPTS: u32 = 30;

/// Result of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition held on the given tick (1-based).
    Converged { ticks: u32 },
    TimedOut { ticks: u32 },
}

impl WaitOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, WaitOutcome::Converged { .. })
    }
}

/// Polls a condition once per `interval`, at most `max_attempts` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waiter {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Waiter {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Sleep, evaluate, repeat.
    ///
    /// The condition is evaluated exactly once per tick, after the interval.
    /// An error from the condition aborts the wait and is returned as-is.
    pub async fn wait<F, Fut, E>(&self, mut condition: F) -> Result<WaitOutcome, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        for tick in 1..=self.max_attempts {
            tokio::time::sleep(self.interval).await;

            if condition().await? {
                debug!(tick, "Condition met");
                return Ok(WaitOutcome::Converged { ticks: tick });
            }
            debug!(tick, max_attempts = self.max_attempts, "Condition not met yet");
        }

        Ok(WaitOutcome::TimedOut {
            ticks: self.max_attempts,
        })
    }
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, DEFAULT_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn counting(
        succeed_on: Option<u32>,
    ) -> (Arc<AtomicU32>, impl FnMut() -> std::future::Ready<Result<bool, String>>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let condition = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(Ok(succeed_on == Some(n)))
        };
        (calls, condition)
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_on_third_tick() {
        let waiter = Waiter::new(Duration::from_millis(1000), 5);
        let (calls, condition) = counting(Some(3));

        let start = Instant::now();
        let outcome = waiter.wait(condition).await.unwrap();

        assert_eq!(outcome, WaitOutcome::Converged { ticks: 3 });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_max_attempts() {
        let waiter = Waiter::new(Duration::from_millis(500), 3);
        let (calls, condition) = counting(None);

        let start = Instant::now();
        let outcome = waiter.wait(condition).await.unwrap();

        assert_eq!(outcome, WaitOutcome::TimedOut { ticks: 3 });
        assert!(!outcome.is_converged());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_condition_error_aborts() {
        let waiter = Waiter::new(Duration::from_secs(1), 10);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = waiter
            .wait(|| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 2 {
                        Err("throttled".to_string())
                    } else {
                        Ok(false)
                    }
                }
            })
            .await;

        assert_eq!(result, Err("throttled".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_times_out_immediately() {
        let waiter = Waiter::new(Duration::from_secs(1), 0);
        let (calls, condition) = counting(Some(1));

        let outcome = waiter.wait(condition).await.unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut { ticks: 0 });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
