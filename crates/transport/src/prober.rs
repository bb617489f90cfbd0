use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Request, header};
use http_body_util::Full;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{HttpClient, HttpError, LatencyMeasurer, LatencyMeasurerFactory, MeasureError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeArgs {
    pub target_url: String,
}

/// Milestones reported by a prober, as nanosecond unix timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    #[serde(default)]
    pub prober_node_id: String,

    #[serde(default)]
    pub url: String,

    pub start: i64,

    #[serde(default)]
    pub dns_end: i64,

    #[serde(default)]
    pub connect_end: i64,

    #[serde(default)]
    pub request_end: i64,

    pub first_byte: i64,

    #[serde(default)]
    pub response_end: i64,

    #[serde(default)]
    pub response_code: u16,
}

impl ProbeResult {
    /// Time to first byte in milliseconds.
    pub fn latency_ms(&self) -> Result<f64, MeasureError> {
        let inconsistent = || MeasureError::InconsistentTimings {
            start: self.start,
            first_byte: self.first_byte,
        };

        let elapsed = self
            .first_byte
            .checked_sub(self.start)
            .ok_or_else(inconsistent)?;
        if elapsed < 0 {
            return Err(inconsistent());
        }

        Ok(elapsed as f64 / 1e6)
    }
}

/// Asks a remote prober to time a request to the target and reports the
/// time to first byte.
pub struct ProberLatencyMeasurer {
    client: HttpClient,
    prober_url: String,
    secret: String,
}

impl ProberLatencyMeasurer {
    pub fn new(client: HttpClient, prober_url: &str, secret: &str) -> Self {
        Self {
            client,
            prober_url: prober_url.to_string(),
            secret: secret.to_string(),
        }
    }
}

#[async_trait]
impl LatencyMeasurer for ProberLatencyMeasurer {
    fn describe(&self) -> String {
        format!("ProberLatencyMeasurer{{prober_url={}}}", self.prober_url)
    }

    async fn measure(&self, endpoint_url: &str) -> Result<f64, MeasureError> {
        let args = ProbeArgs {
            target_url: endpoint_url.to_string(),
        };
        let body = serde_json::to_vec(&args)
            .map_err(|err| MeasureError::Other(format!("failed to encode probe args: {err}")))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.prober_url.as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.secret))
            .body(Full::new(Bytes::from(body)))
            .map_err(HttpError::from)?;

        let response = self.client.fetch(request).await?;
        debug!("Probe response: {}", String::from_utf8_lossy(&response));

        let result: ProbeResult =
            serde_json::from_slice(&response).map_err(MeasureError::Malformed)?;

        result.latency_ms()
    }
}

/// Default [`LatencyMeasurerFactory`]: every region's measurer shares one
/// connection pool.
#[derive(Clone, Default)]
pub struct ProberFactory {
    client: HttpClient,
}

impl ProberFactory {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

impl LatencyMeasurerFactory for ProberFactory {
    fn make(&self, prober_url: &str, secret: &str) -> Arc<dyn LatencyMeasurer> {
        Arc::new(ProberLatencyMeasurer::new(
            self.client.clone(),
            prober_url,
            secret,
        ))
    }
}
