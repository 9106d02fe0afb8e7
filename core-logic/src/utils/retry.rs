use crate::config::{DelayRange, RetryPolicy};
use anyhow::{anyhow, Result};
use std::future::Future;
use tracing::{debug, warn};

/// Sleeps for a delay drawn from `range`. A zero draw returns immediately.
pub async fn pause(range: DelayRange) {
    if range.is_zero() {
        return;
    }
    let delay = range.sample();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Runs `operation` up to `policy.attempts` times, sleeping a randomized
/// delay between attempts. The closure receives the 1-based attempt number.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                warn!(
                    "{} failed (attempt {}/{}): {}",
                    operation_name, attempt, attempts, e
                );
                last_error = Some(e);
                if attempt < attempts {
                    pause(policy.delay).await;
                }
            }
        }
    }

    let last = last_error.unwrap_or_else(|| anyhow!("no attempt was made"));
    Err(last.context(format!(
        "{} failed after {} attempts",
        operation_name, attempts
    )))
}
