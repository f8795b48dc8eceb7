//! Run registry
//!
//! Maps run identifiers to their state, cancel handle and dispatcher task.
//! Entries live for the life of the registry; pruning is left to callers.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use super::cancel::CancelHandle;
use super::planner::Strategy;
use crate::models::{Outcome, RunSnapshot, RunStatus};

/// Mutable part of a run, guarded by `RunState::record`
#[derive(Debug)]
struct RunRecord {
    strategy: Strategy,
    pool_size: usize,
    total_units: usize,
    status: RunStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    outcomes: Vec<Outcome>,
}

/// Live state of one run
///
/// Written only by the run's dispatcher and workers; everyone else reads
/// snapshots.
#[derive(Debug)]
pub struct RunState {
    run_id: String,
    record: RwLock<RunRecord>,
    completed: AtomicUsize,
}

impl RunState {
    pub fn new(run_id: impl Into<String>, strategy: Strategy, pool_size: usize, total_units: usize) -> Self {
        Self {
            run_id: run_id.into(),
            record: RwLock::new(RunRecord {
                strategy,
                pool_size,
                total_units,
                status: RunStatus::Running,
                started_at: Utc::now(),
                ended_at: None,
                failure_reason: None,
                outcomes: Vec::with_capacity(total_units),
            }),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn read(&self) -> RwLockReadGuard<'_, RunRecord> {
        self.record.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RunRecord> {
        self.record.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> RunStatus {
        self.read().status
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.read().total_units
    }

    /// Append a unit outcome and bump the completed count
    ///
    /// Outcomes arriving after cancellation are still kept. Returns false if
    /// the run already holds an outcome for every unit.
    pub fn record_outcome(&self, outcome: Outcome) -> bool {
        let mut record = self.write();
        if record.outcomes.len() >= record.total_units {
            error!(
                run_id = %self.run_id,
                unit = %outcome.test_case_id,
                "Dropping outcome beyond the run's {} units",
                record.total_units
            );
            return false;
        }
        record.outcomes.push(outcome);
        self.completed.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Move RUNNING to a terminal status; only the first transition wins
    pub fn finish(&self, status: RunStatus, reason: Option<String>) -> bool {
        if !status.is_terminal() {
            return false;
        }
        let mut record = self.write();
        if record.status != RunStatus::Running {
            return false;
        }
        record.status = status;
        record.ended_at = Some(Utc::now());
        record.failure_reason = reason;
        true
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let record = self.read();
        RunSnapshot {
            run_id: self.run_id.clone(),
            status: record.status,
            strategy: record.strategy,
            pool_size: record.pool_size,
            total_units: record.total_units,
            // Increments happen under the write lock, so this matches `outcomes`
            completed_units: self.completed(),
            started_at: Some(record.started_at),
            ended_at: record.ended_at,
            failure_reason: record.failure_reason.clone(),
            outcomes: record.outcomes.clone(),
        }
    }
}

/// Registry entry for one run
#[derive(Debug)]
pub struct RunEntry {
    pub state: Arc<RunState>,
    pub cancel: CancelHandle,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl RunEntry {
    pub fn new(state: Arc<RunState>, cancel: CancelHandle) -> Self {
        Self {
            state,
            cancel,
            dispatcher: Mutex::new(None),
        }
    }

    pub fn attach_dispatcher(&self, handle: JoinHandle<()>) {
        let mut slot = self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(handle);
    }

    /// Abort the dispatcher task if it is still running
    pub fn abort_dispatcher(&self) {
        let slot = self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.as_ref() {
            handle.abort();
        }
    }
}

/// Concurrent map of all runs known to this process
#[derive(Clone, Debug, Default)]
pub struct RunRegistry {
    runs: Arc<tokio::sync::RwLock<HashMap<String, Arc<RunEntry>>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, entry: RunEntry) -> Arc<RunEntry> {
        let entry = Arc::new(entry);
        let run_id = entry.state.run_id().to_string();
        let mut runs = self.runs.write().await;
        if runs.contains_key(&run_id) {
            warn!(run_id = %run_id, "Run id already registered, keeping the existing run");
            return runs[&run_id].clone();
        }
        runs.insert(run_id, entry.clone());
        entry
    }

    pub async fn get(&self, run_id: &str) -> Option<Arc<RunEntry>> {
        self.runs.read().await.get(run_id).cloned()
    }

    /// Snapshot of a run, or the NOT_FOUND sentinel
    pub async fn snapshot(&self, run_id: &str) -> RunSnapshot {
        match self.get(run_id).await {
            Some(entry) => entry.state.snapshot(),
            None => RunSnapshot::not_found(run_id),
        }
    }

    pub async fn entries(&self) -> Vec<Arc<RunEntry>> {
        self.runs.read().await.values().cloned().collect()
    }

    /// Snapshots of every run, newest first
    pub async fn list(&self) -> Vec<RunSnapshot> {
        let mut snapshots: Vec<RunSnapshot> = self
            .entries()
            .await
            .iter()
            .map(|e| e.state.snapshot())
            .collect();
        snapshots.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.run_id.cmp(&a.run_id))
        });
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cancel::cancel_pair;
    use crate::models::{ExecutionReport, TestCase};

    fn outcome(id: &str) -> Outcome {
        Outcome::from_report(&TestCase::api(id, "f"), ExecutionReport::passed("ok"), 1, Utc::now())
    }

    #[test]
    fn test_first_terminal_transition_wins() {
        let state = RunState::new("run_a", Strategy::Balanced, 1, 2);
        assert!(state.snapshot().ended_at.is_none());

        assert!(state.finish(RunStatus::Cancelled, None));
        let ended = state.snapshot().ended_at;
        assert!(ended.is_some());

        assert!(!state.finish(RunStatus::Completed, None));
        assert!(!state.finish(RunStatus::Running, None));
        assert_eq!(state.status(), RunStatus::Cancelled);
        assert_eq!(state.snapshot().ended_at, ended);
    }

    #[test]
    fn test_completed_never_exceeds_total() {
        let state = RunState::new("run_b", Strategy::Sequential, 1, 2);
        assert!(state.record_outcome(outcome("a")));
        assert!(state.record_outcome(outcome("b")));
        assert!(!state.record_outcome(outcome("c")));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.completed_units, 2);
        assert_eq!(snapshot.outcomes.len(), 2);
        assert_eq!(state.completed(), state.total());
    }

    #[test]
    fn test_running_state_is_not_finished_by_running() {
        let state = RunState::new("run_c", Strategy::Balanced, 1, 0);
        assert!(!state.finish(RunStatus::NotFound, None));
        assert_eq!(state.status(), RunStatus::Running);
    }

    #[tokio::test]
    async fn test_registry_lookup_and_not_found() {
        let registry = RunRegistry::new();
        let (handle, _signal) = cancel_pair();
        let state = Arc::new(RunState::new("run_d", Strategy::Balanced, 2, 3));
        registry.insert(RunEntry::new(state, handle)).await;

        assert_eq!(registry.list().await.len(), 1);
        assert!(registry.get("run_d").await.is_some());
        assert_eq!(registry.snapshot("run_d").await.status, RunStatus::Running);
        assert_eq!(registry.snapshot("missing").await.status, RunStatus::NotFound);
    }

    #[tokio::test]
    async fn test_registry_keeps_first_entry_for_duplicate_id() {
        let registry = RunRegistry::new();
        let (h1, _s1) = cancel_pair();
        let (h2, _s2) = cancel_pair();
        registry
            .insert(RunEntry::new(Arc::new(RunState::new("dup", Strategy::Balanced, 1, 1)), h1))
            .await;
        let kept = registry
            .insert(RunEntry::new(Arc::new(RunState::new("dup", Strategy::Sequential, 1, 5)), h2))
            .await;

        assert_eq!(kept.state.total(), 1);
        assert_eq!(registry.list().await.len(), 1);
    }
}
