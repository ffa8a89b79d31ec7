//! Blind-oracle data extraction.
//!
//! Recovers strings and counts from a target that answers one yes/no
//! question per request, seen either in the response content or in its
//! latency, and sprays candidate tokens with a first-hit-wins race.

pub mod config;
pub mod core;
pub mod error;
pub mod http;
pub mod logging;
pub mod spray;
pub mod sqli;

pub use config::{CharStrategy, EngineConfig, TimingConfig};
pub use error::{BlindError, Result, TransportError};
pub use http::{HttpResponse, Responder};
pub use spray::{SprayCandidate, SprayEngine, SprayHit, SprayOutcome};
pub use sqli::{
    BlindSession, ContentOracle, Dialect, Enumeration, Enumerator, ExtractionTarget, Extractor,
    Injection, Marker, Oracle, RowSelector, TableDump, TimingOracle, TruthTest,
};
