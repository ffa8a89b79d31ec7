//! Latency oracle: the condition is wrapped in a conditional sleep and the
//! answer is whether the response took at least `threshold`.

use super::{Injection, Oracle, RetryPolicy};
use crate::config::TimingConfig;
use crate::error::{BlindError, Result};
use crate::http::Responder;
use crate::sqli::dialect::Dialect;
use async_trait::async_trait;
use std::time::Duration;

/// Reads per probe before an ambiguous answer is reported.
const AMBIGUOUS_READS: u32 = 2;

pub struct TimingOracle<R> {
    responder: R,
    injection: Injection,
    dialect: Dialect,
    timing: TimingConfig,
    retry: RetryPolicy,
}

impl<R: Responder> TimingOracle<R> {
    pub fn new(responder: R, injection: Injection, dialect: Dialect, timing: TimingConfig) -> Self {
        Self {
            responder,
            injection,
            dialect,
            timing,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// `Some(answer)` for a clear read, `None` when `elapsed` lies strictly
    /// within `margin` of the threshold. A zero margin never abstains.
    fn classify(&self, elapsed: Duration) -> Option<bool> {
        let threshold = self.timing.threshold();
        let distance = if elapsed > threshold {
            elapsed - threshold
        } else {
            threshold - elapsed
        };
        if distance < self.timing.margin() {
            None
        } else {
            Some(elapsed >= threshold)
        }
    }
}

#[async_trait]
impl<R: Responder> Oracle for TimingOracle<R> {
    async fn evaluate(&self, condition: &str) -> Result<bool> {
        let fragment = self
            .dialect
            .build_delay_condition(condition, self.timing.delay());
        let payload = self.injection.wrap(&fragment);

        let mut elapsed = Duration::ZERO;
        for read in 1..=AMBIGUOUS_READS {
            let (_, took) = self.retry.send(&self.responder, &payload).await?;
            elapsed = took;
            if let Some(answer) = self.classify(elapsed) {
                tracing::trace!(condition, elapsed_ms = elapsed.as_millis(), answer, "timing probe");
                return Ok(answer);
            }
            tracing::debug!(
                "ambiguous timing read {}/{}: {}ms",
                read,
                AMBIGUOUS_READS,
                elapsed.as_millis()
            );
        }

        Err(BlindError::OracleAmbiguous {
            elapsed_ms: elapsed.as_millis(),
            threshold_ms: self.timing.threshold().as_millis(),
            margin_ms: self.timing.margin().as_millis(),
        })
    }
}
