//! Wall-clock timing for execution units

use std::time::{Duration, Instant};
use tracing::debug;

/// Measures one unit from its first attempt to its final outcome
#[derive(Debug)]
pub struct UnitTimer {
    start: Instant,
    run_id: String,
    unit: String,
}

impl UnitTimer {
    pub fn start(run_id: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            run_id: run_id.into(),
            unit: unit.into(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Log the unit's wall time across `attempts` and return it
    pub fn stop(self, attempts: u32) -> Duration {
        let elapsed = self.elapsed();
        debug!(
            run_id = %self.run_id,
            unit = %self.unit,
            attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "Unit finished"
        );
        elapsed
    }
}
