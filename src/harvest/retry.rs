use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::app::Result;
use crate::config::RetryConfig;

/// Bounded retry with linear backoff, applied uniformly to every fallible
/// page interaction. Fatal errors (navigation rejections, blocks, dead
/// sessions) short-circuit on the first occurrence; retryable errors get up
/// to `attempts` tries and then surface the last error.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.attempts, Duration::from_millis(config.backoff_ms))
    }

    /// Run `f`, retrying per policy. `op` names the step for log lines.
    pub async fn run<T, F, Fut>(&self, op: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    let pause = self.backoff * attempt;
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        op, attempt, self.attempts, pause, e
                    );
                    tokio::time::sleep(pause).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::app::MagpieError;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let result = policy()
            .run("extract", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(MagpieError::Execution("flaky".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy()
            .run("navigate", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(MagpieError::Blocked("captcha".into())) }
            })
            .await;
        assert!(matches!(result, Err(MagpieError::Blocked(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy()
            .run("panel", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(MagpieError::ElementNotFound("panel".into())) }
            })
            .await;
        assert!(matches!(result, Err(MagpieError::ElementNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        let result = policy.run("noop", || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
