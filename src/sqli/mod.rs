//! Blind SQL injection extraction.
//!
//! - dialect: per-backend payload templates
//! - oracle: boolean probes over content or timing
//! - extract: length, character and bit-count primitives
//! - enumerate: tables, columns and row dumps
//! - session: validated entry point wiring config, dialect and transport

pub mod dialect;
pub mod enumerate;
pub mod extract;
pub mod oracle;
pub mod session;
pub mod target;

pub use dialect::{CountScope, Dialect, RowQuery};
pub use enumerate::{Enumeration, Enumerator, ItemFailure, TableDump};
pub use extract::Extractor;
pub use oracle::{ContentOracle, Injection, Marker, Oracle, RetryPolicy, TimingOracle, TruthTest};
pub use session::BlindSession;
pub use target::{ExtractionTarget, RowSelector};
