use std::future::Future;

use tokio::time::sleep;
use tracing::warn;

use crate::backoff::jittered_backoff_delay;
use crate::error::ApiError;
use crate::metrics;

/// Bounded retry around one logical request.
///
/// Retry is an explicit loop with a local attempt counter; the closure is
/// re-invoked to rebuild the request, so nothing is carried between attempts
/// except that counter. Fatal classifications propagate on first sight.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub async fn run<T, F, Fut>(&self, endpoint: &str, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = jittered_backoff_delay(attempt);
                    metrics::RETRIES_TOTAL.with_label_values(&[err.kind()]).inc();
                    warn!(
                        endpoint,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "request failed; backing off before retry"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
