//! Bounded backoff for reads against an eventually-consistent remote.
//!
//! Right after a mutation the remote may briefly answer "not found". This
//! wrapper retries an operation only while it fails with `NotFound`, with
//! exponential backoff between attempts. Every other error returns at once.

use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between attempts
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Create a config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(5),
        }
    }

    /// Calculate the delay after a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Callback for retry progress notifications.
pub trait RetryCallback {
    /// Called before sleeping ahead of another attempt.
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay: Duration);
}

/// Run `operation`, retrying while it fails with `NotFound`.
///
/// Returns the first success, the first non-`NotFound` error, or the last
/// `NotFound` once `config.max_attempts` is exhausted.
pub fn with_backoff<T, F>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_not_found() => return Err(e),
            Err(e) => {
                if attempt + 1 >= max_attempts {
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt);
                debug!(
                    "attempt {}/{} not visible yet ({}), retrying in {:?}",
                    attempt + 1,
                    max_attempts,
                    e,
                    delay
                );
                if let Some(cb) = callback {
                    cb.on_retry(attempt + 1, max_attempts, &e, delay);
                }

                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_delay_for_attempt() {
        let config = RetryConfig::new(5, Duration::from_millis(100), 2.0);
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped() {
        let config = RetryConfig {
            max_delay: Duration::from_millis(300),
            ..RetryConfig::new(5, Duration::from_millis(100), 2.0)
        };
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(300));
    }

    #[test]
    fn test_success_first_try() {
        let result = with_backoff(&RetryConfig::no_retry(), None, || Ok::<_, Error>(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_eventual_visibility() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result = with_backoff(&fast(5), None, || {
            let current = attempts_clone.get();
            attempts_clone.set(current + 1);
            if current < 2 {
                Err(Error::not_found("gitlab_project_badge", "1:2"))
            } else {
                Ok("visible")
            }
        });

        assert_eq!(result.unwrap(), "visible");
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_other_errors_not_retried() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<()> = with_backoff(&fast(5), None, || {
            attempts_clone.set(attempts_clone.get() + 1);
            Err(Error::unknown_enum("access level", 99))
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let attempts = Rc::new(Cell::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<()> = with_backoff(&fast(3), None, || {
            attempts_clone.set(attempts_clone.get() + 1);
            Err(Error::not_found("gitlab_project_badge", "1:2"))
        });

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_callback_invoked() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingCallback(Arc<AtomicU32>);
        impl RetryCallback for CountingCallback {
            fn on_retry(&self, _: u32, _: u32, _: &Error, _: Duration) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(AtomicU32::new(0));
        let callback = CountingCallback(count.clone());

        let _: Result<()> = with_backoff(&fast(3), Some(&callback), || {
            Err(Error::not_found("gitlab_project_badge", "1:2"))
        });

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
