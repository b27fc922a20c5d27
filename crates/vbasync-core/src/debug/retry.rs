//! Explicit retry with a backoff schedule

use std::fmt::Display;
use std::thread;
use std::time::Duration;

/// How often to try an operation and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    /// Three attempts, waiting 0.5s then 1s
    fn default() -> Self {
        Self::new(3, vec![Duration::from_millis(500), Duration::from_millis(1000)])
    }
}

impl RetryPolicy {
    /// Create a policy
    ///
    /// `backoff[i]` is the wait after failed attempt `i + 1`; the last entry
    /// repeats when the schedule is shorter than the attempts. At least one
    /// attempt is always made.
    #[must_use]
    pub fn new(max_attempts: usize, backoff: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A single attempt, no retries
    #[must_use]
    pub fn once() -> Self {
        Self::new(1, Vec::new())
    }

    /// Maximum number of attempts
    #[must_use]
    pub const fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    fn delay(&self, failed_attempt: usize) -> Duration {
        self.backoff
            .get(failed_attempt)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Run `op` until it succeeds or attempts run out
    ///
    /// `op` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub fn run<T, E: Display>(&self, mut op: impl FnMut(usize) -> Result<T, E>) -> Result<T, E> {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => {
                    tracing::warn!(attempt, "Giving up after error: {err}");
                    return Err(err);
                }
                Err(err) => {
                    let wait = self.delay(attempt - 1);
                    tracing::debug!(
                        attempt,
                        max = self.max_attempts,
                        ?wait,
                        "Attempt failed: {err}"
                    );
                    thread::sleep(wait);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeds_after_failures() {
        let policy = RetryPolicy::new(3, vec![Duration::ZERO]);
        let mut calls = Vec::new();
        let result: Result<&str, String> = policy.run(|attempt| {
            calls.push(attempt);
            if attempt < 3 {
                Err(format!("failure {attempt}"))
            } else {
                Ok("done")
            }
        });
        assert_eq!(result, Ok("done"));
        assert_eq!(calls, vec![1, 2, 3]);
    }

    #[test]
    fn test_returns_last_error() {
        let policy = RetryPolicy::new(2, Vec::new());
        let result: Result<(), String> = policy.run(|attempt| Err(format!("failure {attempt}")));
        assert_eq!(result, Err("failure 2".to_string()));
    }

    #[test]
    fn test_backoff_schedule_repeats_last() {
        let policy = RetryPolicy::new(
            5,
            vec![Duration::from_millis(10), Duration::from_millis(20)],
        );
        assert_eq!(policy.delay(0), Duration::from_millis(10));
        assert_eq!(policy.delay(1), Duration::from_millis(20));
        assert_eq!(policy.delay(3), Duration::from_millis(20));
        assert_eq!(RetryPolicy::once().delay(0), Duration::ZERO);
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Vec::new());
        assert_eq!(policy.max_attempts(), 1);
        let result: Result<u8, String> = policy.run(|_| Ok(7));
        assert_eq!(result, Ok(7));
    }
}
