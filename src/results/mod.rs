//! Result sinks
//!
//! Durable destinations for unit outcomes. The engine hands every recorded
//! outcome to a [`ResultSink`]; failures are logged by the caller and never
//! fail a run.

mod storage;

pub use storage::{ResultsStorage, RunInfo};

use anyhow::Result;
use std::sync::{Mutex, PoisonError};

use crate::models::Outcome;

/// Durable store for outcomes
pub trait ResultSink: Send + Sync {
    fn save(&self, run_id: &str, outcome: &Outcome) -> Result<()>;
}

/// Keeps outcomes in memory, for dry runs and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    saved: Mutex<Vec<(String, Outcome)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes saved for `run_id`, in save order
    pub fn outcomes(&self, run_id: &str) -> Vec<Outcome> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, _)| id == run_id)
            .map(|(_, o)| o.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.saved.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultSink for MemorySink {
    fn save(&self, run_id: &str, outcome: &Outcome) -> Result<()> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((run_id.to_string(), outcome.clone()));
        Ok(())
    }
}
