//! Boolean oracles.
//!
//! An oracle answers one yes/no question per probe. [`ContentOracle`] reads
//! the answer from the response, [`TimingOracle`] from how long the response
//! took. Both hold only immutable configuration; retry bookkeeping lives on
//! the stack of each `evaluate` call, so one oracle can be shared by any
//! number of concurrent workers.

pub mod content;
pub mod retry;
pub mod timing;

pub use content::{ContentOracle, Marker, TruthTest};
pub use retry::RetryPolicy;
pub use timing::TimingOracle;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A remote predicate.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Evaluates `condition` on the target. One logical probe per call.
    async fn evaluate(&self, condition: &str) -> Result<bool>;
}

#[async_trait]
impl<O: Oracle + ?Sized> Oracle for Arc<O> {
    async fn evaluate(&self, condition: &str) -> Result<bool> {
        (**self).evaluate(condition).await
    }
}

#[async_trait]
impl<O: Oracle + ?Sized> Oracle for &O {
    async fn evaluate(&self, condition: &str) -> Result<bool> {
        (**self).evaluate(condition).await
    }
}

/// Text placed around the injected fragment, e.g. `maria' AND (` and `)-- -`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Injection {
    pub prefix: String,
    pub suffix: String,
}

impl Injection {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Passes the fragment through untouched.
    pub fn raw() -> Self {
        Self::default()
    }

    pub fn wrap(&self, fragment: &str) -> String {
        format!("{}{}{}", self.prefix, fragment, self.suffix)
    }
}
