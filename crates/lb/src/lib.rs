use std::cmp::Ordering;

use log::debug;

pub mod region;

pub use region::RegionTable;

/// What a ranking policy knows about one configured PoP.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Position in the PoP configuration.
    pub index: usize,
    pub healthy: bool,
    pub load: f64,
    /// Latency from the client's region; `None` when the region is unknown.
    pub latency_ms: Option<f64>,
}

/// Orders healthy PoPs for a client. Unhealthy PoPs are never returned, and
/// an empty result means no PoP can serve the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankingPolicy {
    #[default]
    LowestLatency,
    ConfigOrder,
    LeastLoad,
}

impl RankingPolicy {
    pub fn from_config(value: &str) -> Result<Self, String> {
        let mode = value.trim().to_lowercase();
        match mode.as_str() {
            "lowest-latency" | "lowest_latency" | "latency" => Ok(Self::LowestLatency),
            "config-order" | "config_order" | "health-only" => Ok(Self::ConfigOrder),
            "least-load" | "least_load" => Ok(Self::LeastLoad),
            _ => Err(format!("unsupported ranking type: {value}")),
        }
    }

    /// Returns candidate indices, best first. Sorting is stable, so ties keep
    /// configuration order.
    pub fn rank(&self, candidates: &[Candidate]) -> Vec<usize> {
        let mut healthy: Vec<&Candidate> = candidates.iter().filter(|c| c.healthy).collect();

        match self {
            RankingPolicy::LowestLatency => healthy.sort_by(|a, b| by_latency(a, b)),
            RankingPolicy::ConfigOrder => {}
            RankingPolicy::LeastLoad => healthy.sort_by(|a, b| a.load.total_cmp(&b.load)),
        }

        if healthy.is_empty() {
            debug!("No healthy PoP among {} candidates", candidates.len());
        }

        healthy.into_iter().map(|c| c.index).collect()
    }
}

fn by_latency(a: &Candidate, b: &Candidate) -> Ordering {
    match (a.latency_ms, b.latency_ms) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
