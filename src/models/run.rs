//! Run models
//!
//! Run status, the read-only snapshot handed to status callers, and the
//! summary derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::outcome::{Outcome, OutcomeStatus};
use crate::engine::Strategy;

/// Lifecycle state of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
    Interrupted,
    /// Returned for identifiers the registry has never issued
    NotFound,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled | RunStatus::Interrupted
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            RunStatus::Running => "…",
            RunStatus::Completed => "✓",
            RunStatus::Failed => "✗",
            RunStatus::Cancelled => "○",
            RunStatus::Interrupted => "!",
            RunStatus::NotFound => "?",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
            RunStatus::Cancelled => "CANCELLED",
            RunStatus::Interrupted => "INTERRUPTED",
            RunStatus::NotFound => "NOT_FOUND",
        };
        write!(f, "{s}")
    }
}

/// Consistent, read-only copy of a run record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: String,
    pub status: RunStatus,
    pub strategy: Strategy,
    pub pool_size: usize,
    pub total_units: usize,
    pub completed_units: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub outcomes: Vec<Outcome>,
}

impl RunSnapshot {
    /// Sentinel for an unknown run identifier
    pub fn not_found(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: RunStatus::NotFound,
            strategy: Strategy::default(),
            pool_size: 0,
            total_units: 0,
            completed_units: 0,
            started_at: None,
            ended_at: None,
            failure_reason: None,
            outcomes: Vec::new(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.status != RunStatus::NotFound
    }

    /// Completion percentage, 100 for empty runs
    pub fn progress(&self) -> f64 {
        if self.total_units == 0 {
            100.0
        } else {
            (self.completed_units as f64 / self.total_units as f64) * 100.0
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_snapshot(self)
    }
}

/// Pass/fail counts and timings for a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub total: usize,
    pub completed: usize,
    pub passed: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
    pub avg_unit_duration_ms: u64,
}

impl RunSummary {
    pub fn from_snapshot(snapshot: &RunSnapshot) -> Self {
        let passed = snapshot
            .outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Passed)
            .count();
        let failed = snapshot.outcomes.len() - passed;

        let unit_total: u64 = snapshot.outcomes.iter().map(|o| o.duration_ms).sum();
        let avg_unit_duration_ms = if snapshot.outcomes.is_empty() {
            0
        } else {
            unit_total / snapshot.outcomes.len() as u64
        };

        let total_duration_ms = match (snapshot.started_at, snapshot.ended_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as u64,
            (Some(start), None) => (Utc::now() - start).num_milliseconds().max(0) as u64,
            _ => 0,
        };

        Self {
            run_id: snapshot.run_id.clone(),
            status: snapshot.status,
            total: snapshot.total_units,
            completed: snapshot.completed_units,
            passed,
            failed,
            total_duration_ms,
            avg_unit_duration_ms,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.completed == 0 {
            0.0
        } else {
            (self.passed as f64 / self.completed as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.status == RunStatus::Completed && self.passed == self.total
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} - {} {}", self.run_id, self.status.symbol(), self.status)?;
        writeln!(
            f,
            "Total: {} | Completed: {} | Passed: {} | Failed: {}",
            self.total, self.completed, self.passed, self.failed
        )?;
        write!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms | Avg unit: {}ms",
            self.pass_rate(),
            self.total_duration_ms,
            self.avg_unit_duration_ms
        )
    }
}
