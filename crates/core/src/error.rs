use std::io;

use gslb_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("expected {expected} entries, one per PoP, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("region index {index} out of range ({count} regions)")]
    UnknownRegion { index: usize, count: usize },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind observability server on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("shutdown signal dropped without being triggered")]
    ShutdownLost,

    #[error("engine task failed: {0}")]
    Task(String),
}
