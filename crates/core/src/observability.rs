use std::{
    collections::HashMap,
    convert::Infallible,
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use http::{HeaderValue, Method, Request, Response, StatusCode, Uri, header};
use http_body_util::Full;
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::{GslbEngine, Shutdown};

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AnnotatedLookup {
    pub ip: Ipv4Addr,
    pub pop_id: String,
}

#[derive(Serialize)]
struct PopView<'a> {
    id: &'a str,
    ip4: String,
    ui_popup_css: &'a str,
}

#[derive(Serialize)]
struct RegionView<'a> {
    id: &'a str,
    prefices: Vec<String>,
    ui_popup_css: &'a str,
}

/// Read-only JSON view of the engine for dashboards.
pub struct ObservabilityServer {
    listener: TcpListener,
    static_dir: Option<PathBuf>,
}

impl ObservabilityServer {
    pub async fn bind(address: &str, static_dir: Option<PathBuf>) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self {
            listener,
            static_dir,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until `shutdown` fires, then lets open connections finish
    /// their in-flight request.
    pub async fn serve(self, engine: GslbEngine, mut shutdown: Shutdown) {
        let static_dir = self.static_dir.map(Arc::new);

        loop {
            let (stream, peer) = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(v) => v,
                    Err(err) => {
                        error!("Observability accept failed: {}", err);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                },
            };

            let engine = engine.clone();
            let static_dir = static_dir.clone();
            let mut conn_shutdown = shutdown.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let engine = engine.clone();
                    let static_dir = static_dir.clone();
                    async move {
                        Ok::<_, Infallible>(handle(&engine, static_dir.as_deref(), req).await)
                    }
                });

                let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                let mut conn = std::pin::pin!(conn);
                let mut draining = false;

                loop {
                    tokio::select! {
                        res = conn.as_mut() => {
                            if let Err(err) = res {
                                debug!("Observability connection from {} ended: {}", peer, err);
                            }
                            break;
                        }
                        _ = conn_shutdown.wait(), if !draining => {
                            draining = true;
                            conn.as_mut().graceful_shutdown();
                        }
                    }
                }
            });
        }

        info!("Observability server stopped");
    }
}

async fn handle(
    engine: &GslbEngine,
    static_dir: Option<&PathBuf>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return response(StatusCode::METHOD_NOT_ALLOWED, TEXT, "GET only");
    }

    let params = query_params(req.uri());

    match req.uri().path() {
        "/pops.json" => pops_json(engine),
        "/regions.json" => regions_json(engine),
        "/query" => query(engine, &params),
        "/latency_to_pop" => latency_to_pop(engine, &params),
        "/latency_to_region" => latency_to_region(engine, &params),
        path => serve_static(static_dir.map(PathBuf::as_path), path).await,
    }
}

fn query_params(uri: &Uri) -> HashMap<String, String> {
    uri.query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

fn pops_json(engine: &GslbEngine) -> Response<Full<Bytes>> {
    let pops: Vec<PopView> = engine
        .pops()
        .iter()
        .map(|p| PopView {
            id: &p.id,
            ip4: p.ip4.to_string(),
            ui_popup_css: &p.ui_popup_css,
        })
        .collect();
    json_response(&pops)
}

fn regions_json(engine: &GslbEngine) -> Response<Full<Bytes>> {
    let regions: Vec<RegionView> = engine
        .regions()
        .iter()
        .map(|r| RegionView {
            id: &r.id,
            prefices: r.prefices.iter().map(ToString::to_string).collect(),
            ui_popup_css: &r.ui_popup_css,
        })
        .collect();
    json_response(&regions)
}

fn query(engine: &GslbEngine, params: &HashMap<String, String>) -> Response<Full<Bytes>> {
    let results = match params.get("srcip").map(String::as_str) {
        None | Some("") => engine.default_ranking(),
        Some(raw) => match raw.parse::<IpAddr>() {
            Ok(client) => engine.query(client),
            Err(_) => return response(StatusCode::BAD_REQUEST, TEXT, "Failed to parse srcip"),
        },
    };

    let lookups: Vec<AnnotatedLookup> = results
        .into_iter()
        .map(|ip| AnnotatedLookup {
            ip,
            pop_id: engine.pop_id_from_address(IpAddr::V4(ip)).to_string(),
        })
        .collect();
    json_response(&lookups)
}

fn latency_to_pop(engine: &GslbEngine, params: &HashMap<String, String>) -> Response<Full<Bytes>> {
    let pop_id = params.get("pop_id").map_or("", String::as_str);
    match engine.latency_to_pop(pop_id) {
        Some(latency) => json_response(&latency),
        None => response(StatusCode::BAD_REQUEST, TEXT, "Invalid pop_id"),
    }
}

fn latency_to_region(
    engine: &GslbEngine,
    params: &HashMap<String, String>,
) -> Response<Full<Bytes>> {
    let region_id = params.get("region_id").map_or("", String::as_str);
    match engine.latency_to_region(region_id) {
        Some(latency) => json_response(&latency),
        None => response(StatusCode::BAD_REQUEST, TEXT, "Invalid region_id"),
    }
}

async fn serve_static(static_dir: Option<&Path>, path: &str) -> Response<Full<Bytes>> {
    let Some(root) = static_dir else {
        return response(StatusCode::NOT_FOUND, TEXT, "not found");
    };

    let mut relative = path.trim_start_matches('/').to_string();
    if relative.is_empty() || relative.ends_with('/') {
        relative.push_str("index.html");
    }

    let relative = Path::new(&relative);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return response(StatusCode::NOT_FOUND, TEXT, "not found");
    }

    match tokio::fs::read(root.join(relative)).await {
        Ok(body) => response(StatusCode::OK, content_type(relative), body),
        Err(_) => response(StatusCode::NOT_FOUND, TEXT, "not found"),
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => JSON,
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

fn json_response<T: Serialize>(value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => response(StatusCode::OK, JSON, body),
        Err(err) => {
            error!("Failed to marshal response: {}", err);
            response(
                StatusCode::INTERNAL_SERVER_ERROR,
                TEXT,
                "Failed to marshal response",
            )
        }
    }
}

fn response(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_query_parameters() {
        let uri: Uri = "/query?srcip=198.51.100.12&pop_id=shin%20juku".parse().unwrap();
        let params = query_params(&uri);
        assert_eq!(params["srcip"], "198.51.100.12");
        assert_eq!(params["pop_id"], "shin juku");

        let uri: Uri = "/pops.json".parse().unwrap();
        assert!(query_params(&uri).is_empty());
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("app/map.js")), "text/javascript");
        assert_eq!(content_type(Path::new("data")), "application/octet-stream");
    }

    #[tokio::test]
    async fn static_paths_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>gslb</h1>").unwrap();

        let ok = serve_static(Some(dir.path()), "/").await;
        assert_eq!(ok.status(), StatusCode::OK);

        let escaped = serve_static(Some(dir.path()), "/../etc/passwd").await;
        assert_eq!(escaped.status(), StatusCode::NOT_FOUND);

        let disabled = serve_static(None, "/index.html").await;
        assert_eq!(disabled.status(), StatusCode::NOT_FOUND);
    }
}
