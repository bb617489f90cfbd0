use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use gslb_config::config::{Pop, Refresh};
use gslb_transport::{FetchError, LatencyMeasurer, MeasureError, PopStatus, StatusFetcher};
use log::{debug, error, info};
use tokio::time::{Instant, timeout_at};

use crate::{EngineError, Shutdown, StateStore, UNREACHABLE_LATENCY_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTiming {
    pub status_timeout: Duration,
    pub latency_timeout: Duration,
    pub interval: Duration,
}

impl From<&Refresh> for RefreshTiming {
    fn from(refresh: &Refresh) -> Self {
        Self {
            status_timeout: Duration::from_millis(refresh.status_timeout_ms),
            latency_timeout: Duration::from_millis(refresh.latency_timeout_ms),
            interval: Duration::from_millis(refresh.interval_ms),
        }
    }
}

/// A region's vantage point.
pub struct RegionProbe {
    pub region_id: String,
    pub measurer: Arc<dyn LatencyMeasurer>,
}

/// Background loop that refreshes PoP health, then per-region latency, then
/// sleeps, until shutdown.
pub struct RefreshScheduler {
    pops: Arc<[Pop]>,
    regions: Vec<RegionProbe>,
    fetcher: Arc<dyn StatusFetcher>,
    store: Arc<StateStore>,
    timing: RefreshTiming,
}

impl RefreshScheduler {
    pub fn new(
        pops: Arc<[Pop]>,
        regions: Vec<RegionProbe>,
        fetcher: Arc<dyn StatusFetcher>,
        store: Arc<StateStore>,
        timing: RefreshTiming,
    ) -> Self {
        Self {
            pops,
            regions,
            fetcher,
            store,
            timing,
        }
    }

    /// Returns `Ok(())` once shutdown is requested. A phase interrupted by
    /// shutdown is dropped before it commits.
    pub async fn run(&self, mut shutdown: Shutdown) -> Result<(), EngineError> {
        info!(
            "Refresh loop started: {} PoPs, {} regions, interval {:?}",
            self.pops.len(),
            self.regions.len(),
            self.timing.interval
        );

        let result = loop {
            tokio::select! {
                biased;
                res = shutdown.wait() => break res,
                () = self.refresh_pop_status() => {}
            }

            tokio::select! {
                biased;
                res = shutdown.wait() => break res,
                () = self.refresh_latency() => {}
            }

            tokio::select! {
                biased;
                res = shutdown.wait() => break res,
                () = tokio::time::sleep(self.timing.interval) => {}
            }
        };

        match &result {
            Ok(()) => info!("Refresh loop stopped"),
            Err(err) => error!("Refresh loop aborted: {}", err),
        }

        result
    }

    /// Status phase: fetch every PoP within the phase deadline, then commit
    /// the whole batch. Failed PoPs stay in the batch, marked with the error.
    pub async fn refresh_pop_status(&self) {
        info!("Status refresh start");
        let start = Instant::now();
        let deadline = start + self.timing.status_timeout;

        let fetches = self.pops.iter().map(|pop| async move {
            debug!("Fetching PoP status for {}", pop.id);

            let result = match timeout_at(deadline, self.fetcher.fetch(pop.ip4)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::DeadlineExceeded),
            };

            match result {
                Ok(status) => status,
                Err(err) => {
                    error!("Status phase: PoP {} ({}) failed: {}", pop.id, pop.ip4, err);
                    PopStatus::failed(err)
                }
            }
        });
        let statuses = join_all(fetches).await;

        match self.store.replace_pop_status(statuses) {
            Ok(version) => info!(
                "Status refresh done in {:?}, version {}",
                start.elapsed(),
                version
            ),
            Err(err) => error!("Status refresh not committed: {}", err),
        }
    }

    /// Latency phase: every region measures each PoP in turn and commits its
    /// own vector as soon as it is complete. Regions run concurrently.
    pub async fn refresh_latency(&self) {
        info!("Latency refresh start");
        let start = Instant::now();
        let deadline = start + self.timing.latency_timeout;

        let regions = self
            .regions
            .iter()
            .enumerate()
            .map(|(index, probe)| self.measure_region(index, probe, deadline));
        join_all(regions).await;

        info!("Latency refresh done in {:?}", start.elapsed());
    }

    async fn measure_region(&self, index: usize, probe: &RegionProbe, deadline: Instant) {
        let describe = probe.measurer.describe();
        debug!("Measuring latency from region {} via {}", probe.region_id, describe);

        let mut latency = Vec::with_capacity(self.pops.len());
        for pop in self.pops.iter() {
            let result = match timeout_at(deadline, probe.measurer.measure(&pop.latency_endpoint_url))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(MeasureError::DeadlineExceeded),
            };

            let value = match result {
                Ok(ms) if ms.is_finite() && ms >= 0.0 => ms,
                Ok(ms) => {
                    error!(
                        "Latency phase: region {} to PoP {} reported invalid latency {} via {}",
                        probe.region_id, pop.id, ms, describe
                    );
                    UNREACHABLE_LATENCY_MS
                }
                Err(err) => {
                    error!(
                        "Latency phase: region {} to PoP {} failed via {}: {}",
                        probe.region_id, pop.id, describe, err
                    );
                    UNREACHABLE_LATENCY_MS
                }
            };
            latency.push(value);
        }

        match self.store.replace_region_latency(index, latency) {
            Ok(version) => debug!(
                "Latency for region {} committed, version {}",
                probe.region_id, version
            ),
            Err(err) => error!(
                "Latency for region {} not committed: {}",
                probe.region_id, err
            ),
        }
    }
}
