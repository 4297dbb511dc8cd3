use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: usize, delay_ms: u64) -> Self {
        RetryPolicy {
            retries,
            delay: Duration::from_millis(delay_ms),
        }
    }
}

/// Retries an async operation with a fixed delay between attempts
///
/// Returns the first success, or the last error once `policy.retries`
/// extra attempts are used up.
pub async fn with_retry<F, Fut, T, E>(mut operation: F, policy: RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > policy.retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt,
                    policy.retries + 1,
                    err
                );
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<u32, String> = with_retry(
            || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Err(format!("fail {n}")) } else { Ok(7) }
            },
            RetryPolicy::new(3, 1),
        )
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<u32, String> = with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("rate limited".to_string())
            },
            RetryPolicy::new(1, 1),
        )
        .await;

        assert_eq!(result, Err("rate limited".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
