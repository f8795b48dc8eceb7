//! Test run execution engine
//!
//! Plans a batch of test cases into execution units, runs them on a bounded
//! per-run worker pool with retries, and tracks every run in a registry that
//! answers status and cancel requests while the run is in flight.

mod cancel;
mod coordinator;
mod error;
mod planner;
mod pool;
mod registry;
mod retry;

pub use coordinator::{EngineSettings, RunCoordinator};
pub use planner::{plan, ExecutionUnit, Strategy};
pub use pool::{PoolPolicy, DEFAULT_BACKLOG};
pub use registry::RunRegistry;
