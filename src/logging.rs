//! Logging setup for the binary.

use crate::error::{BlindError, Result};
use tracing_subscriber::EnvFilter;

/// Maps `-q` / `-v` flags to a level name.
pub fn level_for(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    }
}

/// Initializes the global subscriber. `RUST_LOG` wins over the flags.
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("blindspot={}", level_for(verbose, quiet))));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| BlindError::invalid_config(format!("failed to initialize logging: {}", e)))
}
