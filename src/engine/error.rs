//! Engine-level errors
//!
//! Unit failures never appear here; they are absorbed into FAILED outcomes.

use thiserror::Error;

use crate::models::TestType;

/// Errors that stop a run from being scheduled
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid pool size {0}: a parallel pool needs at least one worker")]
    InvalidPoolSize(usize),

    #[error("Invalid backlog capacity {0}")]
    InvalidBacklog(usize),

    #[error("No executor registered for {0} test cases")]
    MissingExecutor(TestType),

    #[error("Worker pool closed while dispatching unit {0}")]
    PoolClosed(usize),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
