//! Candidate spraying: probe many values concurrently, keep the first hit.

pub mod engine;

pub use engine::{SprayCandidate, SprayEngine, SprayHit, SprayOutcome};
