//! Engine configuration.
//!
//! Every option has a default except the dialect, which the caller must name.
//! The binary fills this struct from CLI flags; library callers can also load
//! it from JSON.

use crate::error::{BlindError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default upper bound for string length searches.
pub const DEFAULT_MAX_LEN: usize = 128;

/// Printable ASCII range searched per character.
pub const DEFAULT_CHARSET: (u8, u8) = (32, 126);

/// Bits probed for counts; covers values up to 4095.
pub const DEFAULT_MAX_BITS: u32 = 12;

pub const DEFAULT_RETRY_LIMIT: u32 = 3;
pub const DEFAULT_BACKOFF_MS: u64 = 250;
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_GRACE_MS: u64 = 500;
pub const DEFAULT_TIMING_MARGIN_SECS: f64 = 0.25;

/// How a single character is recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharStrategy {
    /// Binary search on the ordinal with `>` probes, confirmed with `=`.
    #[default]
    Bisect,
    /// Seven independent bit probes, confirmed with `=`.
    BitMask,
}

/// Settings for the latency oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Delay injected when the condition holds.
    pub delay_secs: f64,
    /// Elapsed time at or above which the answer is "true".
    pub threshold_secs: f64,
    /// Reads within this distance of the threshold are ambiguous.
    #[serde(default = "default_margin")]
    pub margin_secs: f64,
}

impl TimingConfig {
    pub fn new(delay_secs: f64, threshold_secs: f64) -> Self {
        Self {
            delay_secs,
            threshold_secs,
            margin_secs: DEFAULT_TIMING_MARGIN_SECS,
        }
    }

    pub fn delay(&self) -> Duration {
        saturating_secs(self.delay_secs)
    }

    pub fn threshold(&self) -> Duration {
        saturating_secs(self.threshold_secs)
    }

    pub fn margin(&self) -> Duration {
        saturating_secs(self.margin_secs)
    }
}

/// Seconds to a `Duration`, clamped instead of panicking on values
/// `validate` would reject.
fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

fn checked_secs(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| {
        BlindError::invalid_config(format!("{} = {} is not a usable duration: {}", field, secs, e))
    })
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub dialect: String,
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    #[serde(default = "default_charset")]
    pub charset_bounds: (u8, u8),
    #[serde(default = "default_max_bits")]
    pub max_bits: u32,
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency_limit: usize,
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    #[serde(default)]
    pub char_strategy: CharStrategy,
    #[serde(default)]
    pub timeout_secs: Option<f64>,
    #[serde(default)]
    pub timing: Option<TimingConfig>,
}

fn default_max_len() -> usize {
    DEFAULT_MAX_LEN
}
fn default_charset() -> (u8, u8) {
    DEFAULT_CHARSET
}
fn default_max_bits() -> u32 {
    DEFAULT_MAX_BITS
}
fn default_retry_limit() -> u32 {
    DEFAULT_RETRY_LIMIT
}
fn default_backoff_ms() -> u64 {
    DEFAULT_BACKOFF_MS
}
fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}
fn default_grace_ms() -> u64 {
    DEFAULT_GRACE_MS
}
fn default_margin() -> f64 {
    DEFAULT_TIMING_MARGIN_SECS
}

impl EngineConfig {
    /// Configuration with every default applied for the named dialect.
    pub fn new(dialect: impl Into<String>) -> Self {
        Self {
            dialect: dialect.into(),
            max_len: DEFAULT_MAX_LEN,
            charset_bounds: DEFAULT_CHARSET,
            max_bits: DEFAULT_MAX_BITS,
            retry_limit: DEFAULT_RETRY_LIMIT,
            backoff_ms: DEFAULT_BACKOFF_MS,
            concurrency_limit: DEFAULT_CONCURRENCY,
            grace_ms: DEFAULT_GRACE_MS,
            char_strategy: CharStrategy::default(),
            timeout_secs: None,
            timing: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BlindError::invalid_config(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn with_char_strategy(mut self, strategy: CharStrategy) -> Self {
        self.char_strategy = strategy;
        self
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(saturating_secs)
    }

    /// Checks value ranges. Does not resolve the dialect name.
    pub fn validate(&self) -> Result<()> {
        if self.max_len == 0 {
            return Err(BlindError::invalid_config("max_len must be at least 1"));
        }
        let (lo, hi) = self.charset_bounds;
        if lo > hi || hi > 127 {
            return Err(BlindError::invalid_config(format!(
                "charset bounds {}..={} must be ascending within ASCII",
                lo, hi
            )));
        }
        if self.max_bits == 0 || self.max_bits > 62 {
            return Err(BlindError::invalid_config("max_bits must be within 1..=62"));
        }
        if self.concurrency_limit == 0 {
            return Err(BlindError::invalid_config("concurrency_limit must be at least 1"));
        }
        if let Some(timeout) = self.timeout_secs {
            if !(timeout > 0.0) {
                return Err(BlindError::invalid_config("timeout_secs must be positive"));
            }
            checked_secs("timeout_secs", timeout)?;
        }
        if let Some(timing) = &self.timing {
            if !(timing.delay_secs > 0.0) || !(timing.threshold_secs > 0.0) {
                return Err(BlindError::invalid_config(
                    "timing delay and threshold must be positive",
                ));
            }
            if timing.threshold_secs > timing.delay_secs {
                return Err(BlindError::invalid_config(format!(
                    "timing threshold {}s exceeds the injected delay {}s",
                    timing.threshold_secs, timing.delay_secs
                )));
            }
            if timing.margin_secs < 0.0 {
                return Err(BlindError::invalid_config("timing margin must not be negative"));
            }
            checked_secs("delay_secs", timing.delay_secs)?;
            checked_secs("threshold_secs", timing.threshold_secs)?;
            checked_secs("margin_secs", timing.margin_secs)?;
        }
        Ok(())
    }
}
