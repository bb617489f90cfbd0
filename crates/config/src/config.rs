use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::default::{
    get_default_interval_ms, get_default_latency_timeout_ms, get_default_log,
    get_default_log_level, get_default_ranking, get_default_ranking_type, get_default_refresh,
    get_default_status_port, get_default_status_timeout_ms,
};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    // Bearer token presented to every prober
    #[serde(default)]
    pub prober_secret: String,

    // Order is significant: latency vectors and tie-breaks follow it.
    pub pops: Vec<Pop>,

    pub regions: Vec<Region>,

    // absent = no dashboard server
    #[serde(default)]
    pub observability: Option<Observability>,

    #[serde(default = "get_default_refresh")]
    pub refresh: Refresh,

    #[serde(default = "get_default_ranking")]
    pub ranking: Ranking,

    #[serde(default = "get_default_log")]
    pub log: Log,
}

/// A Point of Presence that can receive client traffic.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Pop {
    pub id: String,

    pub ip4: Ipv4Addr,

    /// URL the probers fetch to time the round trip to this PoP.
    pub latency_endpoint_url: String,

    #[serde(default)]
    pub ui_popup_css: String,
}

/// A group of client prefixes sharing one latency vantage point.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Region {
    pub id: String,

    pub prefices: Vec<Ipv4Network>,

    pub prober_url: String, // "http://203.0.113.10:8823/probe"

    #[serde(default)]
    pub ui_popup_css: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Observability {
    pub address: String, // "127.0.0.1:8080"

    #[serde(default)]
    pub static_dir: Option<String>,
}

impl Observability {
    /// Listen address with a bare `:port` widened to all interfaces.
    pub fn bind_address(&self) -> String {
        if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Refresh {
    #[serde(default = "get_default_status_timeout_ms")]
    pub status_timeout_ms: u64,

    #[serde(default = "get_default_latency_timeout_ms")]
    pub latency_timeout_ms: u64,

    #[serde(default = "get_default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "get_default_status_port")]
    pub status_port: u16,
}

impl Default for Refresh {
    fn default() -> Self {
        get_default_refresh()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Ranking {
    #[serde(rename = "type", default = "get_default_ranking_type")]
    pub ranking_type: String, // "lowest-latency", "config-order", "least-load"
}

impl Default for Ranking {
    fn default() -> Self {
        get_default_ranking()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Log {
    #[serde(default = "get_default_log_level")]
    pub level: String, // "info, warn, error"

    #[serde(default)]
    pub file: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        get_default_log()
    }
}
