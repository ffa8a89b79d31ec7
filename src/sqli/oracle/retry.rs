use crate::error::{BlindError, Result};
use crate::http::{HttpResponse, Responder};
use std::time::Duration;
use tokio::time::Instant;

/// Transport retry with exponential backoff.
///
/// `retry_limit` counts retries, so a limit of 3 allows 4 attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_limit: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_limit: crate::config::DEFAULT_RETRY_LIMIT,
            base_backoff: Duration::from_millis(crate::config::DEFAULT_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(retry_limit: u32, base_backoff: Duration) -> Self {
        Self {
            retry_limit,
            base_backoff,
        }
    }

    /// Backoff before retry number `retry` (0-based): base * 2^retry.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_backoff.saturating_mul(1u32 << retry.min(16))
    }

    /// Sends `payload`, retrying transport failures. Returns the response and
    /// the elapsed time of the successful attempt only. A round trip measured
    /// by the transport wins over the wall clock here, which also covers any
    /// rate-limit queueing inside the responder.
    pub async fn send<R>(&self, responder: &R, payload: &str) -> Result<(HttpResponse, Duration)>
    where
        R: Responder + ?Sized,
    {
        let mut retry = 0;
        loop {
            let start = Instant::now();
            match responder.send(payload).await {
                Ok(response) => {
                    let elapsed = response.elapsed.unwrap_or_else(|| start.elapsed());
                    return Ok((response, elapsed));
                }
                Err(source) if retry >= self.retry_limit => {
                    return Err(BlindError::Network {
                        attempts: retry + 1,
                        source,
                    });
                }
                Err(e) => {
                    let wait = self.backoff(retry);
                    tracing::warn!(
                        "transport failure (attempt {}/{}): {}; retrying in {:?}",
                        retry + 1,
                        self.retry_limit + 1,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    retry += 1;
                }
            }
        }
    }
}
