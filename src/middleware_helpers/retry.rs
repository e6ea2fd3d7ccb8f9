use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first call included
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Decides whether a failed attempt is retried and how long to wait first.
///
/// `attempt` is 1-based: the delay returned after the first failure is the
/// one for `attempt == 1`.
pub trait RetryPolicy<E> {
    fn retry_delay(&self, error: &E, attempt: u32) -> Option<Duration>;
}

/// Execute an async function with retries
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    policy: &impl RetryPolicy<E>,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!("Operation succeeded after {} attempts", attempts);
                }
                return Ok(result);
            }
            Err(error) => {
                let delay = if attempts >= config.max_attempts {
                    None
                } else {
                    policy.retry_delay(&error, attempts)
                };

                let Some(delay) = delay else {
                    warn!("Operation failed after {} attempts: {}", attempts, error);
                    return Err(error);
                };

                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}...",
                    attempts, config.max_attempts, error, delay
                );
                metrics::counter!("bakery_ledger.retry.attempts", 1);

                sleep(delay).await;
            }
        }
    }
}
