//! Data collection capabilities used by the refresh loop, plus the default
//! HTTP transports that implement them.

use std::{net::Ipv4Addr, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

pub mod http_client;
pub mod prober;
pub mod status;

pub use http_client::{DEFAULT_BODY_LIMIT, HttpClient, HttpError};
pub use prober::{ProbeArgs, ProbeResult, ProberFactory, ProberLatencyMeasurer};
pub use status::{HttpStatusFetcher, PopStatus};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("malformed status document: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum MeasureError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("malformed probe result: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("prober returned first_byte={first_byte} before start={start}")]
    InconsistentTimings { start: i64, first_byte: i64 },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("{0}")]
    Other(String),
}

/// Fetches the current health and load of one PoP.
///
/// Callers bound each call with their own deadline by dropping the returned
/// future; implementations must not block the executor.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch(&self, pop_address: Ipv4Addr) -> Result<PopStatus, FetchError>;
}

/// Measures round-trip latency from one region's vantage point.
#[async_trait]
pub trait LatencyMeasurer: Send + Sync {
    /// Identity used in log lines.
    fn describe(&self) -> String;

    /// Latency in milliseconds to `endpoint_url`.
    async fn measure(&self, endpoint_url: &str) -> Result<f64, MeasureError>;
}

/// Builds the measurer for one region from its prober URL and the shared secret.
pub trait LatencyMeasurerFactory: Send + Sync {
    fn make(&self, prober_url: &str, secret: &str) -> Arc<dyn LatencyMeasurer>;
}
