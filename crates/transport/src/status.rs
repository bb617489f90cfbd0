use std::net::Ipv4Addr;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Request};
use http_body_util::Full;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{FetchError, HttpClient, HttpError, StatusFetcher};

pub const STATUS_PATH: &str = "/statusz";

pub const NOT_YET_AVAILABLE: &str = "not yet available";

/// Health record of a PoP. An empty `error` means healthy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopStatus {
    #[serde(default)]
    pub id: String,

    /// Seconds since the PoP process started.
    #[serde(default)]
    pub uptime: f64,

    #[serde(default)]
    pub load: f64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl PopStatus {
    pub fn not_yet_available() -> Self {
        Self::failed(NOT_YET_AVAILABLE)
    }

    /// A record carrying only the failure reason.
    pub fn failed(reason: impl ToString) -> Self {
        Self {
            error: reason.to_string(),
            ..Default::default()
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.error.is_empty()
    }
}

/// Reads `http://{pop}:{port}/statusz` and decodes it as a [`PopStatus`].
#[derive(Clone)]
pub struct HttpStatusFetcher {
    client: HttpClient,
    port: u16,
}

impl HttpStatusFetcher {
    pub fn new(client: HttpClient, port: u16) -> Self {
        Self { client, port }
    }

    pub fn status_url(&self, pop_address: Ipv4Addr) -> String {
        format!("http://{}:{}{}", pop_address, self.port, STATUS_PATH)
    }
}

#[async_trait]
impl StatusFetcher for HttpStatusFetcher {
    async fn fetch(&self, pop_address: Ipv4Addr) -> Result<PopStatus, FetchError> {
        let url = self.status_url(pop_address);
        debug!("Fetching PoP status from url {}", url);

        let request = Request::builder()
            .method(Method::GET)
            .uri(url.as_str())
            .body(Full::new(Bytes::new()))
            .map_err(HttpError::from)?;

        let body = self.client.fetch(request).await?;

        serde_json::from_slice(&body).map_err(FetchError::Malformed)
    }
}
