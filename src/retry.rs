use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

/// Bounded retry with linear backoff: retry `k` waits `base_delay * k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

/// Which try an operation is on. The first try is retry 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub retry: u32,
}

impl Attempt {
    pub fn is_retry(self) -> bool {
        self.retry > 0
    }
}

/// Every attempt failed. Carries the error of the last one.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last: E,
}

impl RetryPolicy {
    pub fn delay_before(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(retry)
    }

    /// Runs `op` until it returns `Ok`, at most `1 + max_retries` times.
    ///
    /// Only errors are retried. Outcomes that must not be retried (a missing page, say) should
    /// come back as `Ok` values.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, Exhausted<E>>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retry = 0;
        loop {
            match op(Attempt { retry }).await {
                Ok(value) => return Ok(value),
                Err(last) if retry >= self.max_retries => {
                    return Err(Exhausted {
                        attempts: retry + 1,
                        last,
                    })
                }
                Err(_) => {
                    retry += 1;
                    let delay = self.delay_before(retry);
                    debug!(retry, ?delay, "backing off");
                    sleep(delay).await;
                }
            }
        }
    }
}
