use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Throttling Retry
// ============================================================================
//
// Retries store requests that failed for transient reasons (throttling,
// timeouts) with exponential backoff. Permanent failures are returned on the
// first attempt. The number of retries and the cap on the wait between them
// come from the connector settings.
//
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Retry policy for throttled requests: `retries` extra attempts, never
    /// waiting longer than `max_wait` between two of them.
    pub fn throttling(retries: u32, max_wait: Duration) -> Self {
        Self {
            max_attempts: retries + 1,
            initial_delay: Duration::from_millis(100).min(max_wait),
            max_delay: max_wait,
            multiplier: 2.0,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        let next = Duration::from_millis(((delay.as_millis() as f64) * self.multiplier) as u64);
        next.min(self.max_delay)
    }
}

/// Check if an error is transient (should retry) or permanent (should not retry)
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Run `operation`, retrying transient failures until `config.max_attempts`
/// is reached. The attempt number (starting at 1) is passed to the closure.
pub async fn retry_on_transient<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    retry_when(config, operation_name, E::is_transient, operation).await
}

/// Like `retry_on_transient`, retrying only the failures `should_retry` accepts
pub async fn retry_when<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if !should_retry(&error) {
                    return Err(error);
                }

                if attempt >= config.max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt = attempt,
                        error = %error,
                        "Operation failed after all retries"
                    );
                    return Err(error);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying after delay"
                );

                sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}
