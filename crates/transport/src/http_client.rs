use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("send failed: {0}")]
    Send(#[from] hyper_util::client::legacy::Error),

    #[error("unexpected response status {0}")]
    Status(StatusCode),

    #[error("failed to read response body: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("response body exceeds {0} bytes")]
    TooLarge(usize),
}

/// Status documents and probe results are a few hundred bytes.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Plain HTTP/1 client shared by the default status and latency transports.
#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
    body_limit: usize,
}

impl HttpClient {
    pub fn new() -> Self {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(http);

        Self {
            client,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Caps how many body bytes [`fetch`](Self::fetch) buffers.
    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    pub async fn send(&self, req: Request<Full<Bytes>>) -> Result<Response<Incoming>, HttpError> {
        Ok(self.client.request(req).await?)
    }

    /// Sends `req` and returns the collected body of a 2xx response.
    pub async fn fetch(&self, req: Request<Full<Bytes>>) -> Result<Bytes, HttpError> {
        let response = self.send(req).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status(status));
        }

        match Limited::new(response.into_body(), self.body_limit)
            .collect()
            .await
        {
            Ok(body) => Ok(body.to_bytes()),
            Err(err) if err.is::<LengthLimitError>() => Err(HttpError::TooLarge(self.body_limit)),
            Err(err) => Err(HttpError::Body(err)),
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}
