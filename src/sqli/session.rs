//! Entry point that ties a validated configuration to a transport.

use crate::config::EngineConfig;
use crate::error::{BlindError, Result};
use crate::http::Responder;
use crate::sqli::dialect::Dialect;
use crate::sqli::enumerate::Enumerator;
use crate::sqli::extract::Extractor;
use crate::sqli::oracle::{ContentOracle, Injection, Oracle, RetryPolicy, TimingOracle, TruthTest};
use std::sync::Arc;

/// A configured extraction session against one injection point.
///
/// Construction validates the configuration and resolves the dialect, so an
/// unknown backend is refused before the responder is ever called.
pub struct BlindSession<R> {
    config: EngineConfig,
    dialect: Dialect,
    responder: Arc<R>,
    injection: Injection,
}

impl<R: Responder> BlindSession<R> {
    pub fn new(config: EngineConfig, responder: R) -> Result<Self> {
        config.validate()?;
        let dialect = Dialect::from_name(&config.dialect)?;
        tracing::debug!("session ready for {}", dialect);

        Ok(Self {
            config,
            dialect,
            responder: Arc::new(responder),
            injection: Injection::raw(),
        })
    }

    pub fn with_injection(mut self, injection: Injection) -> Self {
        self.injection = injection;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.retry_limit, self.config.backoff())
    }

    pub fn content_oracle<T: TruthTest>(&self, test: T) -> ContentOracle<Arc<R>, T> {
        ContentOracle::new(self.responder.clone(), self.injection.clone(), test)
            .with_retry(self.retry_policy())
    }

    /// Latency oracle; needs the `timing` section of the configuration.
    pub fn timing_oracle(&self) -> Result<TimingOracle<Arc<R>>> {
        let timing = self.config.timing.clone().ok_or_else(|| {
            BlindError::invalid_config("timing oracle needs a timing delay and threshold")
        })?;
        Ok(TimingOracle::new(
            self.responder.clone(),
            self.injection.clone(),
            self.dialect,
            timing,
        )
        .with_retry(self.retry_policy()))
    }

    pub fn extractor<O: Oracle>(&self, oracle: O) -> Extractor<O> {
        Extractor::from_config(oracle, self.dialect, &self.config)
    }

    pub fn enumerator<O: Oracle>(&self, oracle: O) -> Enumerator<O> {
        Enumerator::new(self.extractor(oracle))
    }
}
