//! Error taxonomy for blind extraction.
//!
//! Primitives propagate every error immediately; nothing here is ever turned
//! into a placeholder character or a default value.

use std::time::Duration;
use thiserror::Error;

/// Transport-level failure reported by a [`crate::Responder`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("blocked out-of-scope request: {0}")]
    OutOfScope(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Free-form failure, used by custom responders.
    #[error("{0}")]
    Other(String),
}

/// Main error type for extraction, enumeration and spraying.
#[derive(Debug, Error)]
pub enum BlindError {
    /// Dialect name not present in the registry. Raised before any probe.
    #[error("unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// Transport kept failing after the retry budget was spent.
    #[error("network error after {attempts} attempt(s): {source}")]
    Network {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// Timing read stayed inside the ambiguity margin after a retry.
    #[error(
        "ambiguous timing read: {elapsed_ms}ms is within {margin_ms}ms of the {threshold_ms}ms threshold"
    )]
    OracleAmbiguous {
        elapsed_ms: u128,
        threshold_ms: u128,
        margin_ms: u128,
    },

    /// Search range exhausted without a confirming answer.
    #[error("extraction exhausted: {context}")]
    ExtractionExhausted { context: String },

    /// Bit-mask value does not fit in the configured number of bits.
    #[error("value does not fit in {max_bits} bits")]
    CountOverflow { max_bits: u32 },

    /// Some items of a hierarchical enumeration could not be recovered.
    #[error("partial enumeration: {recovered} recovered, {failed} failed ({first_failure})")]
    PartialEnumeration {
        recovered: usize,
        failed: usize,
        first_failure: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, BlindError>;

impl BlindError {
    pub fn exhausted(context: impl Into<String>) -> Self {
        Self::ExtractionExhausted {
            context: context.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Errors after which probing the same target again is pointless.
    ///
    /// Enumeration stops at these instead of isolating them per item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Timeout(_)
                | Self::UnsupportedDialect(_)
                | Self::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let network = BlindError::Network {
            attempts: 4,
            source: TransportError::Other("connection reset".into()),
        };
        assert!(network.is_fatal());
        assert!(BlindError::Timeout(Duration::from_secs(1)).is_fatal());
        assert!(!BlindError::exhausted("pos 3").is_fatal());
        assert!(!BlindError::CountOverflow { max_bits: 12 }.is_fatal());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = BlindError::exhausted("char 2 of DATABASE()");
        assert!(err.to_string().contains("char 2 of DATABASE()"));

        let err = BlindError::UnsupportedDialect("Oracle11g".into());
        assert_eq!(err.to_string(), "unsupported dialect: Oracle11g");
    }
}
