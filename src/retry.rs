use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use leptos::logging::log;

/// Bounds the re-execution of a failed remote call: total number of
/// invocations and the delay inserted between them. The delay grows by
/// `backoff_factor` after each failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: u32,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            initial_delay,
            backoff_factor: 2,
        }
    }

    /// Delay to wait after the given 1-based failed attempt.
    fn delay_after(&self, attempt: u32) -> Duration {
        self.initial_delay * self.backoff_factor.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_millis(250))
    }
}

/// Runs `op` with the default policy. See [`with_retry_policy`].
pub async fn with_retry<T, E, F, Fut>(op: F) -> Result<T, E>
where
    E: Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retry_policy(RetryPolicy::default(), op).await
}

/// Executes an asynchronous operation, re-executing it after each failure
/// until it succeeds or `policy.max_attempts` invocations have been made.
/// Returns the first success, or the final failure once attempts are
/// exhausted. The operation always runs at least once.
///
/// Retried operations are re-executed as-is; a mutation that succeeded on the
/// server but failed in transit will run again (at-least-once semantics —
/// idempotence is the caller's responsibility).
pub async fn with_retry_policy<T, E, F, Fut>(policy: RetryPolicy, op: F) -> Result<T, E>
where
    E: Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.max_attempts => {
                log!("remote call failed after {} attempts: {}", attempt, err);
                return Err(err);
            }
            Err(err) => {
                log!("remote call failed (attempt {}): {}", attempt, err);
                pause(policy.delay_after(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
async fn pause(delay: Duration) {
    gloo_timers::future::TimeoutFuture::new(delay.as_millis() as u32).await;
}

#[cfg(all(not(target_arch = "wasm32"), feature = "ssr"))]
async fn pause(delay: Duration) {
    tokio::time::sleep(delay).await;
}

#[cfg(all(not(target_arch = "wasm32"), not(feature = "ssr")))]
async fn pause(_delay: Duration) {
    // No async timer without a runtime; retry immediately.
}
