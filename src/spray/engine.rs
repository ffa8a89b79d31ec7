//! Concurrent "first hit wins" probing.

use crate::config::{EngineConfig, DEFAULT_CONCURRENCY, DEFAULT_GRACE_MS};
use crate::error::{BlindError, Result};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A value to try, plus whatever a successful probe correlated with it
/// (a session cookie, for instance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SprayCandidate {
    pub value: String,
    pub correlated: Option<String>,
}

impl SprayCandidate {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            correlated: None,
        }
    }

    pub fn with_correlated(mut self, correlated: impl Into<String>) -> Self {
        self.correlated = Some(correlated.into());
        self
    }
}

impl From<&str> for SprayCandidate {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The winning probe result and its position in the candidate list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SprayHit {
    pub index: usize,
    pub candidate: SprayCandidate,
}

#[derive(Debug, Clone, Serialize)]
pub struct SprayOutcome {
    pub hit: Option<SprayHit>,
    /// Probes actually started, winner included.
    pub probes_issued: usize,
}

impl SprayOutcome {
    pub fn winner(&self) -> Option<&SprayCandidate> {
        self.hit.as_ref().map(|hit| &hit.candidate)
    }
}

pub struct SprayEngine {
    concurrency_limit: usize,
    grace: Duration,
}

impl Default for SprayEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY, Duration::from_millis(DEFAULT_GRACE_MS))
    }
}

impl SprayEngine {
    /// `grace` is how long in-flight probes may keep running after a winner
    /// before they are aborted.
    pub fn new(concurrency_limit: usize, grace: Duration) -> Self {
        Self {
            concurrency_limit,
            grace,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.concurrency_limit, config.grace())
    }

    /// Probes every candidate with at most `concurrency_limit` in flight and
    /// returns the first hit.
    ///
    /// Probe errors count as misses. Once a hit is recorded no new probe is
    /// started; probes still running get the grace period, then are aborted
    /// and their results discarded. At most one hit is ever returned.
    pub async fn race<P, Fut, E>(
        &self,
        candidates: Vec<SprayCandidate>,
        probe: P,
    ) -> Result<SprayOutcome>
    where
        P: Fn(SprayCandidate) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Option<SprayCandidate>, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        check_candidates(&candidates)?;
        if self.concurrency_limit == 0 {
            return Err(BlindError::invalid_config("concurrency_limit must be at least 1"));
        }

        tracing::info!(
            "[SPRAY] Racing {} candidates ({} in flight)",
            candidates.len(),
            self.concurrency_limit
        );
        let indexed = candidates.into_iter().enumerate().collect();
        Ok(self
            .run(indexed, Arc::new(probe), self.concurrency_limit)
            .await)
    }

    /// Like [`Self::race`], but in fixed-size batches run one after another.
    /// Stops between batches once a hit is found.
    pub async fn race_batched<P, Fut, E>(
        &self,
        candidates: Vec<SprayCandidate>,
        probe: P,
        batch_size: usize,
    ) -> Result<SprayOutcome>
    where
        P: Fn(SprayCandidate) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Option<SprayCandidate>, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        check_candidates(&candidates)?;
        if batch_size == 0 {
            return Err(BlindError::invalid_config("batch_size must be at least 1"));
        }

        let probe = Arc::new(probe);
        let total = candidates.len();
        let mut remaining = candidates.into_iter().enumerate().peekable();
        let mut outcome = SprayOutcome {
            hit: None,
            probes_issued: 0,
        };

        while remaining.peek().is_some() {
            let batch: Vec<_> = remaining.by_ref().take(batch_size).collect();
            tracing::debug!(
                "[SPRAY] Batch starting at {} of {}",
                batch.first().map(|(i, _)| *i).unwrap_or_default(),
                total
            );
            let result = self.run(batch, Arc::clone(&probe), batch_size).await;
            outcome.probes_issued += result.probes_issued;
            if result.hit.is_some() {
                outcome.hit = result.hit;
                break;
            }
        }
        Ok(outcome)
    }

    async fn run<P, Fut, E>(
        &self,
        candidates: Vec<(usize, SprayCandidate)>,
        probe: Arc<P>,
        limit: usize,
    ) -> SprayOutcome
    where
        P: Fn(SprayCandidate) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Option<SprayCandidate>, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(limit));
        let winner: Arc<OnceLock<SprayHit>> = Arc::new(OnceLock::new());
        let issued = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();

        for (index, candidate) in candidates {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if winner.get().is_some() {
                break;
            }

            let probe = Arc::clone(&probe);
            let winner = Arc::clone(&winner);
            let issued = Arc::clone(&issued);
            tasks.spawn(async move {
                let _permit = permit;
                if winner.get().is_some() {
                    return;
                }
                issued.fetch_add(1, Ordering::SeqCst);
                match (*probe)(candidate).await {
                    Ok(Some(found)) => {
                        let hit = SprayHit {
                            index,
                            candidate: found,
                        };
                        if winner.set(hit).is_ok() {
                            tracing::info!("[SPRAY] Hit at candidate {}", index);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::debug!("[SPRAY] Probe {} failed: {}", index, e),
                }
            });
        }

        while winner.get().is_none() {
            if tasks.join_next().await.is_none() {
                break;
            }
        }

        if winner.get().is_some() && !tasks.is_empty() {
            let draining = async { while tasks.join_next().await.is_some() {} };
            if tokio::time::timeout(self.grace, draining).await.is_err() {
                tracing::debug!("[SPRAY] Aborting {} straggling probes", tasks.len());
            }
            tasks.abort_all();
        }

        SprayOutcome {
            hit: winner.get().cloned(),
            probes_issued: issued.load(Ordering::SeqCst),
        }
    }
}

fn check_candidates(candidates: &[SprayCandidate]) -> Result<()> {
    if candidates.is_empty() {
        return Err(BlindError::invalid_config("empty candidate list"));
    }
    Ok(())
}
