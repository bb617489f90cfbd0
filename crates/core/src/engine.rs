use std::{
    collections::BTreeMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use gslb_config::{
    ConfigError,
    config::{Config, Observability, Pop, Region},
    validator::validate,
};
use gslb_lb::{Candidate, RankingPolicy, RegionTable};
use gslb_transport::{
    HttpClient, HttpStatusFetcher, LatencyMeasurerFactory, ProberFactory, StatusFetcher,
};
use http::{Uri, uri::Scheme};
use log::{debug, error, info};
use tokio::task::JoinHandle;

use crate::{
    EngineError, Shutdown, Snapshot, StateStore,
    observability::ObservabilityServer,
    scheduler::{RefreshScheduler, RefreshTiming, RegionProbe},
};

/// Returned by [`GslbEngine::pop_id_from_address`] for unknown addresses.
pub const POP_NOT_FOUND: &str = "<not found>";

struct Inner {
    pops: Arc<[Pop]>,
    regions: Arc<[Region]>,
    region_table: RegionTable,
    ranking: RankingPolicy,
    observability: Option<Observability>,
    store: Arc<StateStore>,
    scheduler: RefreshScheduler,
}

/// Handle to one engine instance. Clones share the same state.
#[derive(Clone)]
pub struct GslbEngine {
    inner: Arc<Inner>,
}

pub struct EngineBuilder {
    config: Config,
    status_fetcher: Option<Arc<dyn StatusFetcher>>,
    measurer_factory: Option<Arc<dyn LatencyMeasurerFactory>>,
}

impl EngineBuilder {
    /// Replaces the default `GET /statusz` transport.
    pub fn status_fetcher(mut self, fetcher: impl StatusFetcher + 'static) -> Self {
        self.status_fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Replaces the default prober transport.
    pub fn latency_measurer_factory(
        mut self,
        factory: impl LatencyMeasurerFactory + 'static,
    ) -> Self {
        self.measurer_factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> Result<GslbEngine, ConfigError> {
        validate(&self.config)?;

        // The default transport has no TLS connector.
        if self.measurer_factory.is_none() {
            if let Some(region) = self
                .config
                .regions
                .iter()
                .find(|r| !is_plain_http(&r.prober_url))
            {
                let message = format!(
                    "Prober URL '{}' for region id '{}' must use http://",
                    region.prober_url, region.id
                );
                error!("{}", message);
                return Err(ConfigError::Invalid(message));
            }
        }

        let ranking = RankingPolicy::from_config(&self.config.ranking.ranking_type)
            .map_err(ConfigError::Invalid)?;
        let timing = RefreshTiming::from(&self.config.refresh);

        let client = HttpClient::new();
        let status_port = self.config.refresh.status_port;
        let fetcher = self
            .status_fetcher
            .unwrap_or_else(|| Arc::new(HttpStatusFetcher::new(client.clone(), status_port)));
        let factory = self
            .measurer_factory
            .unwrap_or_else(|| Arc::new(ProberFactory::new(client)));

        let Config {
            prober_secret,
            pops,
            regions,
            observability,
            ..
        } = self.config;

        let pops: Arc<[Pop]> = pops.into();
        let regions: Arc<[Region]> = regions.into();

        let probes = regions
            .iter()
            .map(|region| RegionProbe {
                region_id: region.id.clone(),
                measurer: factory.make(&region.prober_url, &prober_secret),
            })
            .collect();

        let store = Arc::new(StateStore::new(pops.len(), regions.len()));
        let scheduler = RefreshScheduler::new(
            pops.clone(),
            probes,
            fetcher,
            store.clone(),
            timing,
        );

        Ok(GslbEngine {
            inner: Arc::new(Inner {
                region_table: RegionTable::new(&regions),
                pops,
                regions,
                ranking,
                observability,
                store,
                scheduler,
            }),
        })
    }
}

fn is_plain_http(url: &str) -> bool {
    url.parse::<Uri>()
        .is_ok_and(|uri| uri.scheme() == Some(&Scheme::HTTP))
}

impl GslbEngine {
    /// Builds an engine that talks to real PoPs and probers.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder {
            config,
            status_fetcher: None,
            measurer_factory: None,
        }
    }

    pub fn pops(&self) -> &[Pop] {
        &self.inner.pops
    }

    pub fn regions(&self) -> &[Region] {
        &self.inner.regions
    }

    pub fn ranking(&self) -> RankingPolicy {
        self.inner.ranking
    }

    /// Change counter, suitable as a zone SOA serial.
    pub fn version(&self) -> u32 {
        self.inner.store.version()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.store.snapshot()
    }

    pub fn resolve_region(&self, client: IpAddr) -> Option<&Region> {
        self.inner
            .region_table
            .resolve(client)
            .and_then(|idx| self.inner.regions.get(idx))
    }

    /// PoP addresses for `client`, best first. Empty when no PoP is healthy.
    pub fn query(&self, client: IpAddr) -> Vec<Ipv4Addr> {
        let region = self.inner.region_table.resolve(client);
        debug!(
            "Query from {} resolved to region {}",
            client,
            region
                .and_then(|idx| self.inner.regions.get(idx))
                .map_or("<none>", |r| r.id.as_str())
        );
        self.rank(region)
    }

    /// Ranking used for clients outside every configured region.
    pub fn default_ranking(&self) -> Vec<Ipv4Addr> {
        self.rank(None)
    }

    fn rank(&self, region: Option<usize>) -> Vec<Ipv4Addr> {
        let snapshot = self.inner.store.snapshot();
        let latency = region.and_then(|idx| snapshot.region_latency.get(idx));

        let candidates: Vec<Candidate> = snapshot
            .pop_status
            .iter()
            .enumerate()
            .map(|(index, status)| Candidate {
                index,
                healthy: status.is_healthy(),
                load: status.load,
                latency_ms: latency.and_then(|l| l.get(index).copied()),
            })
            .collect();

        self.inner
            .ranking
            .rank(&candidates)
            .into_iter()
            .filter_map(|idx| self.inner.pops.get(idx).map(|pop| pop.ip4))
            .collect()
    }

    /// Reverse lookup over the static PoP list only.
    pub fn pop_id_from_address(&self, address: IpAddr) -> &str {
        let IpAddr::V4(address) = address.to_canonical() else {
            return POP_NOT_FOUND;
        };

        self.inner
            .pops
            .iter()
            .find(|pop| pop.ip4 == address)
            .map_or(POP_NOT_FOUND, |pop| pop.id.as_str())
    }

    /// Current latency from every region to `pop_id`, keyed by region id.
    pub fn latency_to_pop(&self, pop_id: &str) -> Option<BTreeMap<String, f64>> {
        let pop_idx = self.inner.pops.iter().position(|p| p.id == pop_id)?;
        let snapshot = self.inner.store.snapshot();

        Some(
            self.inner
                .regions
                .iter()
                .zip(snapshot.region_latency.iter())
                .filter_map(|(region, latency)| {
                    latency.get(pop_idx).map(|ms| (region.id.clone(), *ms))
                })
                .collect(),
        )
    }

    /// Current latency from `region_id` to every PoP, keyed by PoP id.
    pub fn latency_to_region(&self, region_id: &str) -> Option<BTreeMap<String, f64>> {
        let region_idx = self.inner.regions.iter().position(|r| r.id == region_id)?;
        let latency = self.inner.store.region_latency(region_idx)?;

        Some(
            self.inner
                .pops
                .iter()
                .zip(latency.iter())
                .map(|(pop, ms)| (pop.id.clone(), *ms))
                .collect(),
        )
    }

    /// Runs one status phase now, outside the background loop.
    pub async fn refresh_pop_status(&self) {
        self.inner.scheduler.refresh_pop_status().await
    }

    /// Runs one latency phase now, outside the background loop.
    pub async fn refresh_latency(&self) {
        self.inner.scheduler.refresh_latency().await
    }

    /// Starts the observability server (when configured) and the refresh
    /// loop. Returns once the server is listening.
    pub async fn start(&self, shutdown: Shutdown) -> Result<EngineHandle, EngineError> {
        let mut observability_addr = None;
        let mut observability_task = None;

        if let Some(observability) = &self.inner.observability {
            let address = observability.bind_address();
            let bind_error = |source| EngineError::Bind {
                address: address.clone(),
                source,
            };

            let server = ObservabilityServer::bind(
                &address,
                observability.static_dir.as_ref().map(PathBuf::from),
            )
            .await
            .map_err(bind_error)?;
            let addr = server.local_addr().map_err(bind_error)?;

            info!("Observability server listening on http://{}", addr);
            observability_addr = Some(addr);
            observability_task = Some(tokio::spawn(server.serve(self.clone(), shutdown.clone())));
        }

        let engine = self.clone();
        let refresh = tokio::spawn(async move { engine.inner.scheduler.run(shutdown).await });

        Ok(EngineHandle {
            observability_addr,
            refresh,
            observability: observability_task,
        })
    }

    /// [`start`](Self::start) followed by [`EngineHandle::join`].
    pub async fn run(&self, shutdown: Shutdown) -> Result<(), EngineError> {
        self.start(shutdown).await?.join().await
    }
}

/// Tasks of a started engine.
pub struct EngineHandle {
    observability_addr: Option<SocketAddr>,
    refresh: JoinHandle<Result<(), EngineError>>,
    observability: Option<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn observability_addr(&self) -> Option<SocketAddr> {
        self.observability_addr
    }

    /// Waits for the engine to stop. `Ok(())` means it was shut down.
    pub async fn join(self) -> Result<(), EngineError> {
        let result = match self.refresh.await {
            Ok(result) => result,
            Err(err) => Err(EngineError::Task(err.to_string())),
        };

        if let Some(task) = self.observability {
            if result.is_err() {
                task.abort();
            }
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    error!("Observability server task failed: {}", err);
                }
            }
        }

        result
    }
}
