//! GSLB engine: keeps a health and latency picture of every PoP fresh in the
//! background and answers "which PoP should serve this client" from it.

pub mod engine;
pub mod error;
pub mod observability;
pub mod scheduler;
pub mod shutdown;
pub mod state;

pub use engine::{EngineBuilder, EngineHandle, GslbEngine, POP_NOT_FOUND};
pub use error::{EngineError, StateError};
pub use observability::{AnnotatedLookup, ObservabilityServer};
pub use shutdown::Shutdown;
pub use state::{INITIAL_LATENCY_MS, Snapshot, StateStore, UNREACHABLE_LATENCY_MS};
