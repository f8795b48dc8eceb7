//! Results storage and retrieval
//!
//! Outcomes are appended as JSON lines to `<run_id>.jsonl` while a run is in
//! flight; the final snapshot is written to `<run_id>.json` once it ends.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use super::ResultSink;
use crate::models::{Outcome, RunSnapshot, RunStatus};

/// Results storage manager
#[derive(Debug)]
pub struct ResultsStorage {
    /// Base directory for results
    base_dir: PathBuf,
    /// Serializes appends from concurrent workers
    append_lock: Mutex<()>,
}

impl ResultsStorage {
    /// Create a new results storage
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            append_lock: Mutex::new(()),
        }
    }

    /// Create with default directory
    pub fn default_dir() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("qa-orchestrator")
            .join("results");
        Self::new(base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Ensure storage directory exists
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!("Failed to create results directory: {}", self.base_dir.display())
        })
    }

    fn outcomes_path(&self, run_id: &str) -> Result<PathBuf> {
        check_run_id(run_id)?;
        Ok(self.base_dir.join(format!("{run_id}.jsonl")))
    }

    fn snapshot_path(&self, run_id: &str) -> Result<PathBuf> {
        check_run_id(run_id)?;
        Ok(self.base_dir.join(format!("{run_id}.json")))
    }

    /// Write the final snapshot of a run
    pub fn save_snapshot(&self, snapshot: &RunSnapshot) -> Result<PathBuf> {
        self.ensure_dir()?;

        let path = self.snapshot_path(&snapshot.run_id)?;
        let file = File::create(&path).context("Failed to create results file")?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, snapshot).context("Failed to write results")?;

        info!("Saved run results to {}", path.display());
        Ok(path)
    }

    /// Load a run's final snapshot
    pub fn load(&self, run_id: &str) -> Result<RunSnapshot> {
        let path = self.snapshot_path(run_id)?;
        self.load_from_path(&path)
    }

    /// Load from a specific path
    pub fn load_from_path(&self, path: &Path) -> Result<RunSnapshot> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open results file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let snapshot = serde_json::from_reader(reader).context("Failed to parse results")?;
        debug!("Loaded run results from {}", path.display());
        Ok(snapshot)
    }

    /// Outcomes appended for a run, skipping unreadable lines
    pub fn load_outcomes(&self, run_id: &str) -> Result<Vec<Outcome>> {
        let path = self.outcomes_path(run_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path)
            .with_context(|| format!("Failed to open outcomes file: {}", path.display()))?;

        let mut outcomes = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => debug!("Skipping line {} of {}: {}", number + 1, path.display(), e),
            }
        }
        Ok(outcomes)
    }

    /// List stored runs, newest first
    pub fn list_runs(&self) -> Result<Vec<RunInfo>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match self.load_from_path(&path) {
                    Ok(snapshot) => runs.push(RunInfo::from_snapshot(&snapshot)),
                    Err(e) => debug!("Failed to load {}: {}", path.display(), e),
                }
            }
        }

        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    /// Get the most recent stored run
    pub fn latest(&self) -> Result<Option<RunSnapshot>> {
        match self.list_runs()?.into_iter().next() {
            Some(info) => Ok(Some(self.load(&info.run_id)?)),
            None => Ok(None),
        }
    }

    /// Delete a run's snapshot and outcomes
    pub fn delete(&self, run_id: &str) -> Result<()> {
        for path in [self.snapshot_path(run_id)?, self.outcomes_path(run_id)?] {
            if path.exists() {
                fs::remove_file(&path)?;
                info!("Deleted results: {}", path.display());
            }
        }
        Ok(())
    }
}

impl ResultSink for ResultsStorage {
    fn save(&self, run_id: &str, outcome: &Outcome) -> Result<()> {
        let path = self.outcomes_path(run_id)?;
        let line = serde_json::to_string(outcome).context("Failed to serialize outcome")?;

        let _guard = self.append_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_dir()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open outcomes file: {}", path.display()))?;
        writeln!(file, "{line}").context("Failed to append outcome")?;
        Ok(())
    }
}

/// Run ids become file names, so keep them to one path component
fn check_run_id(run_id: &str) -> Result<()> {
    if run_id.is_empty() || run_id.contains(['/', '\\']) || run_id.starts_with('.') {
        anyhow::bail!("Invalid run id: {run_id:?}");
    }
    Ok(())
}

/// Brief run information
#[derive(Clone, Debug)]
pub struct RunInfo {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub total_units: usize,
    pub pass_rate: f64,
}

impl RunInfo {
    fn from_snapshot(snapshot: &RunSnapshot) -> Self {
        Self {
            run_id: snapshot.run_id.clone(),
            status: snapshot.status,
            started_at: snapshot.started_at,
            total_units: snapshot.total_units,
            pass_rate: snapshot.summary().pass_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Strategy;
    use crate::models::{ExecutionReport, TestCase};
    use tempfile::tempdir;
    use tokio_test::{assert_err, assert_ok};

    fn outcome(id: &str, success: bool) -> Outcome {
        let report = if success {
            ExecutionReport::passed("ok")
        } else {
            ExecutionReport::failed("bad", "boom")
        };
        Outcome::from_report(&TestCase::api(id, "f"), report, 1, Utc::now())
    }

    fn snapshot(run_id: &str, started_at: DateTime<Utc>, outcomes: Vec<Outcome>) -> RunSnapshot {
        RunSnapshot {
            run_id: run_id.to_string(),
            status: RunStatus::Completed,
            strategy: Strategy::Balanced,
            pool_size: 1,
            total_units: outcomes.len(),
            completed_units: outcomes.len(),
            started_at: Some(started_at),
            ended_at: Some(started_at),
            failure_reason: None,
            outcomes,
        }
    }

    #[test]
    fn test_append_and_load_outcomes() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path().join("results"));

        assert_ok!(storage.save("run_1", &outcome("a", true)));
        assert_ok!(storage.save("run_1", &outcome("b", false)));

        let loaded = assert_ok!(storage.load_outcomes("run_1"));
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].test_case_id, "b");
        assert!(storage.load_outcomes("run_2").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());
        storage.save("run_1", &outcome("a", true)).unwrap();
        let path = dir.path().join("run_1.jsonl");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "not json").unwrap();

        assert_eq!(storage.load_outcomes("run_1").unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_round_trip_and_listing() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());
        let now = Utc::now();

        storage
            .save_snapshot(&snapshot("run_old", now - chrono::Duration::hours(1), vec![outcome("a", false)]))
            .unwrap();
        storage
            .save_snapshot(&snapshot("run_new", now, vec![outcome("a", true), outcome("b", true)]))
            .unwrap();

        let runs = storage.list_runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, "run_new");
        assert_eq!(runs[0].pass_rate, 100.0);

        let latest = storage.latest().unwrap().unwrap();
        assert_eq!(latest.run_id, "run_new");
        assert_eq!(latest.outcomes.len(), 2);
    }

    #[test]
    fn test_delete_removes_both_files() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());
        storage.save("run_1", &outcome("a", true)).unwrap();
        storage
            .save_snapshot(&snapshot("run_1", Utc::now(), vec![outcome("a", true)]))
            .unwrap();

        storage.delete("run_1").unwrap();
        assert!(storage.list_runs().unwrap().is_empty());
        assert!(storage.load_outcomes("run_1").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_run_ids() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());
        assert_err!(storage.load("../etc/passwd"));
        assert_err!(storage.save("a/b", &outcome("a", true)));
        assert_err!(storage.delete(""));
    }
}
