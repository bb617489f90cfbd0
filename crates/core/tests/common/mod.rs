#![allow(dead_code)]

use std::{collections::HashMap, net::Ipv4Addr, sync::Arc, time::Duration};

use async_trait::async_trait;
use gslb_config::config::{Config, Observability, Pop, Refresh, Region};
use gslb_core::GslbEngine;
use gslb_transport::{
    FetchError, LatencyMeasurer, LatencyMeasurerFactory, MeasureError, PopStatus, StatusFetcher,
};

pub const DOWN_POP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 254);

pub fn pops() -> Vec<Pop> {
    [
        ("tokyo", [192, 0, 2, 1]),
        ("osaka", [192, 0, 2, 2]),
        ("seattle", [192, 0, 2, 3]),
        ("down", [192, 0, 2, 254]),
    ]
    .into_iter()
    .map(|(id, ip)| Pop {
        id: id.to_string(),
        ip4: Ipv4Addr::from(ip),
        latency_endpoint_url: format!("http://{}/latency", Ipv4Addr::from(ip)),
        ui_popup_css: format!("left: {}px", ip[3]),
    })
    .collect()
}

pub fn region(id: &str, prefix: &str) -> Region {
    Region {
        id: id.to_string(),
        prefices: vec![prefix.parse().unwrap()],
        prober_url: format!("http://{id}.probers.test:8823/probe"),
        ui_popup_css: String::new(),
    }
}

pub fn regions() -> Vec<Region> {
    vec![
        region("us-west", "198.51.100.0/28"),
        region("us-east", "198.51.100.64/28"),
        region("tokyo", "203.0.113.0/24"),
    ]
}

pub fn config() -> Config {
    Config {
        prober_secret: "s3cret".to_string(),
        pops: pops(),
        regions: regions(),
        observability: None,
        refresh: Refresh {
            status_timeout_ms: 200,
            latency_timeout_ms: 200,
            interval_ms: 20,
            status_port: 8889,
        },
        ..Default::default()
    }
}

pub fn config_with_observability(static_dir: Option<String>) -> Config {
    Config {
        observability: Some(Observability {
            address: "127.0.0.1:0".to_string(),
            static_dir,
        }),
        ..config()
    }
}

/// Healthy for every PoP except [`DOWN_POP`].
pub struct FakeFetcher;

#[async_trait]
impl StatusFetcher for FakeFetcher {
    async fn fetch(&self, pop_address: Ipv4Addr) -> Result<PopStatus, FetchError> {
        if pop_address == DOWN_POP {
            return Err(FetchError::Other("PoP is down.".to_string()));
        }
        Ok(PopStatus {
            id: pop_address.to_string(),
            uptime: 100.0,
            load: 0.25,
            error: String::new(),
        })
    }
}

pub struct AllDownFetcher;

#[async_trait]
impl StatusFetcher for AllDownFetcher {
    async fn fetch(&self, _pop_address: Ipv4Addr) -> Result<PopStatus, FetchError> {
        Err(FetchError::Other("PoP is down.".to_string()))
    }
}

/// Never answers for [`DOWN_POP`].
pub struct HangingFetcher;

#[async_trait]
impl StatusFetcher for HangingFetcher {
    async fn fetch(&self, pop_address: Ipv4Addr) -> Result<PopStatus, FetchError> {
        if pop_address == DOWN_POP {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        FakeFetcher.fetch(pop_address).await
    }
}

pub struct ConstantMeasurer(pub f64);

#[async_trait]
impl LatencyMeasurer for ConstantMeasurer {
    fn describe(&self) -> String {
        format!("ConstantMeasurer{{{}}}", self.0)
    }

    async fn measure(&self, _endpoint_url: &str) -> Result<f64, MeasureError> {
        Ok(self.0)
    }
}

pub struct ConstantFactory(pub f64);

impl LatencyMeasurerFactory for ConstantFactory {
    fn make(&self, _prober_url: &str, _secret: &str) -> Arc<dyn LatencyMeasurer> {
        Arc::new(ConstantMeasurer(self.0))
    }
}

/// Answers `ms` for every endpoint except the one of [`DOWN_POP`], which
/// never answers.
pub struct HangingMeasurer(pub f64);

#[async_trait]
impl LatencyMeasurer for HangingMeasurer {
    fn describe(&self) -> String {
        "HangingMeasurer".to_string()
    }

    async fn measure(&self, endpoint_url: &str) -> Result<f64, MeasureError> {
        if endpoint_url == format!("http://{DOWN_POP}/latency") {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Ok(self.0)
    }
}

pub struct HangingFactory(pub f64);

impl LatencyMeasurerFactory for HangingFactory {
    fn make(&self, _prober_url: &str, _secret: &str) -> Arc<dyn LatencyMeasurer> {
        Arc::new(HangingMeasurer(self.0))
    }
}

/// Latency by endpoint URL; unknown endpoints fail.
pub struct TableMeasurer(HashMap<String, f64>);

#[async_trait]
impl LatencyMeasurer for TableMeasurer {
    fn describe(&self) -> String {
        "TableMeasurer".to_string()
    }

    async fn measure(&self, endpoint_url: &str) -> Result<f64, MeasureError> {
        self.0
            .get(endpoint_url)
            .copied()
            .ok_or_else(|| MeasureError::Other(format!("no route to {endpoint_url}")))
    }
}

/// Per-prober latency tables, keyed by prober URL then PoP id.
pub struct TableFactory(pub HashMap<String, HashMap<String, f64>>);

impl TableFactory {
    /// us-west prefers seattle, tokyo prefers tokyo, us-east has no data.
    pub fn standard() -> Self {
        let mut tables = HashMap::new();
        tables.insert(
            region("us-west", "0.0.0.0/0").prober_url,
            by_endpoint(&[("tokyo", 110.0), ("osaka", 120.0), ("seattle", 8.5), ("down", 1.0)]),
        );
        tables.insert(
            region("tokyo", "0.0.0.0/0").prober_url,
            by_endpoint(&[("tokyo", 2.0), ("osaka", 9.0), ("seattle", 95.0), ("down", 1.0)]),
        );
        Self(tables)
    }
}

fn by_endpoint(latency: &[(&str, f64)]) -> HashMap<String, f64> {
    let pops = pops();
    latency
        .iter()
        .filter_map(|(id, ms)| {
            pops.iter()
                .find(|p| p.id == *id)
                .map(|p| (p.latency_endpoint_url.clone(), *ms))
        })
        .collect()
}

impl LatencyMeasurerFactory for TableFactory {
    fn make(&self, prober_url: &str, _secret: &str) -> Arc<dyn LatencyMeasurer> {
        Arc::new(TableMeasurer(
            self.0.get(prober_url).cloned().unwrap_or_default(),
        ))
    }
}

pub fn engine(config: Config) -> GslbEngine {
    GslbEngine::builder(config)
        .status_fetcher(FakeFetcher)
        .latency_measurer_factory(TableFactory::standard())
        .build()
        .unwrap()
}

/// Polls until the engine has committed at least `version` changes.
pub async fn wait_for_version(engine: &GslbEngine, version: u32) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.version() < version {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("engine did not reach the expected version in time");
}
