use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gslb_transport::PopStatus;

use crate::StateError;

/// Latency every region starts with before its first measurement.
pub const INITIAL_LATENCY_MS: f64 = 10_000_000.0;

/// Latency recorded when a measurement fails.
pub const UNREACHABLE_LATENCY_MS: f64 = 20_000_000.0;

struct State {
    pop_status: Arc<[PopStatus]>,
    region_latency: Vec<Arc<[f64]>>,
    version: u32,
}

/// Point-in-time copy of the engine state. Holding one does not block writers.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u32,
    /// One record per configured PoP, in configuration order.
    pub pop_status: Arc<[PopStatus]>,
    /// One vector per configured region; entry `i` is the latency to PoP `i`.
    pub region_latency: Vec<Arc<[f64]>>,
}

/// The single synchronization point for mutable engine state.
///
/// Writers swap whole collections and bump the version under one short lock.
/// No I/O ever happens while the lock is held.
pub struct StateStore {
    state: Mutex<State>,
    pop_count: usize,
}

impl StateStore {
    pub fn new(pop_count: usize, region_count: usize) -> Self {
        let pop_status: Arc<[PopStatus]> = (0..pop_count)
            .map(|_| PopStatus::not_yet_available())
            .collect();
        let region_latency = (0..region_count)
            .map(|_| Arc::from(vec![INITIAL_LATENCY_MS; pop_count]))
            .collect();

        Self {
            state: Mutex::new(State {
                pop_status,
                region_latency,
                version: 0,
            }),
            pop_count,
        }
    }

    // Every critical section leaves the state consistent, so a poisoned
    // lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces every PoP status record at once and returns the new version.
    pub fn replace_pop_status(&self, statuses: Vec<PopStatus>) -> Result<u32, StateError> {
        if statuses.len() != self.pop_count {
            return Err(StateError::LengthMismatch {
                expected: self.pop_count,
                actual: statuses.len(),
            });
        }

        let statuses: Arc<[PopStatus]> = statuses.into();

        let mut state = self.lock();
        state.pop_status = statuses;
        state.version = state.version.wrapping_add(1);
        Ok(state.version)
    }

    /// Replaces one region's latency vector and returns the new version.
    pub fn replace_region_latency(
        &self,
        region: usize,
        latency: Vec<f64>,
    ) -> Result<u32, StateError> {
        if latency.len() != self.pop_count {
            return Err(StateError::LengthMismatch {
                expected: self.pop_count,
                actual: latency.len(),
            });
        }

        let latency: Arc<[f64]> = latency.into();

        let mut state = self.lock();
        let count = state.region_latency.len();
        let slot = state
            .region_latency
            .get_mut(region)
            .ok_or(StateError::UnknownRegion {
                index: region,
                count,
            })?;
        *slot = latency;
        state.version = state.version.wrapping_add(1);
        Ok(state.version)
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            version: state.version,
            pop_status: state.pop_status.clone(),
            region_latency: state.region_latency.clone(),
        }
    }

    pub fn version(&self) -> u32 {
        self.lock().version
    }

    pub fn pop_status(&self) -> Arc<[PopStatus]> {
        self.lock().pop_status.clone()
    }

    pub fn region_latency(&self, region: usize) -> Option<Arc<[f64]>> {
        self.lock().region_latency.get(region).cloned()
    }
}
