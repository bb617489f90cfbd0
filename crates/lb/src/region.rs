use std::net::{IpAddr, Ipv4Addr};

use gslb_config::config::Region;
use ipnetwork::Ipv4Network;

/// Maps client addresses to configured regions by longest prefix match.
#[derive(Debug, Clone)]
pub struct RegionTable {
    // (prefix, region index), longest prefix first; equal lengths keep
    // configuration order so the first-listed region wins.
    entries: Vec<(Ipv4Network, usize)>,
}

impl RegionTable {
    pub fn new(regions: &[Region]) -> Self {
        let mut entries: Vec<(Ipv4Network, usize)> = regions
            .iter()
            .enumerate()
            .flat_map(|(idx, region)| region.prefices.iter().map(move |p| (*p, idx)))
            .collect();

        entries.sort_by(|a, b| b.0.prefix().cmp(&a.0.prefix()).then(a.1.cmp(&b.1)));

        Self { entries }
    }

    pub fn resolve(&self, client: IpAddr) -> Option<usize> {
        match client.to_canonical() {
            IpAddr::V4(addr) => self.resolve_v4(addr),
            IpAddr::V6(_) => None,
        }
    }

    pub fn resolve_v4(&self, client: Ipv4Addr) -> Option<usize> {
        self.entries
            .iter()
            .find(|(prefix, _)| prefix.contains(client))
            .map(|(_, idx)| *idx)
    }
}
