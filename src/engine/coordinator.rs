//! Run coordinator
//!
//! Owns the lifecycle of every run: plans units, registers the run, spawns
//! one dispatcher task per run and answers status and cancel requests.
//!
//! ```text
//! RUNNING ──► COMPLETED    all units finished
//!         ├─► FAILED       scheduling failed before every unit was submitted
//!         ├─► CANCELLED    cancel() while running
//!         └─► INTERRUPTED  dispatcher aborted (e.g. coordinator shutdown)
//! ```

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::cancel::{cancel_pair, CancelSignal};
use super::error::EngineError;
use super::planner::{self, ExecutionUnit, Strategy};
use super::pool::{PoolPolicy, WorkerPool, DEFAULT_BACKLOG};
use super::registry::{RunEntry, RunRegistry, RunState};
use super::retry::{self, DEFAULT_BACKOFF};
use crate::config::AppConfig;
use crate::executors::{ExecutorSet, TestExecutor};
use crate::models::{Priority, RunSnapshot, RunStatus, TestCase};
use crate::results::ResultSink;

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Timing and capacity knobs for the engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Pause between attempts of a failing unit
    pub retry_backoff: Duration,
    /// Units that may wait for a worker before submissions run inline
    pub backlog_capacity: usize,
    /// How long a stopping pool waits for running units before aborting them
    pub shutdown_grace: Duration,
    /// Interval for status polling while waiting on a run
    pub status_poll: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            retry_backoff: DEFAULT_BACKOFF,
            backlog_capacity: DEFAULT_BACKLOG,
            shutdown_grace: Duration::from_secs(5),
            status_poll: Duration::from_millis(500),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            backlog_capacity: config.backlog_capacity,
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
            status_poll: Duration::from_millis(config.status_poll_ms),
        }
    }
}

/// Submission, status and cancellation surface of the engine
#[derive(Clone)]
pub struct RunCoordinator {
    registry: RunRegistry,
    executors: ExecutorSet,
    sink: Arc<dyn ResultSink>,
    policy: PoolPolicy,
    settings: EngineSettings,
}

impl RunCoordinator {
    pub fn new(registry: RunRegistry, executors: ExecutorSet, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            registry,
            executors,
            sink,
            policy: PoolPolicy::detect(),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_policy(mut self, policy: PoolPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Start a run and return its identifier without waiting for it
    pub async fn submit(
        &self,
        test_cases: Vec<TestCase>,
        parallel: bool,
        pool_size: usize,
        strategy: Strategy,
    ) -> String {
        let run_id = generate_run_id();
        let units = planner::plan(&run_id, &test_cases, strategy);
        let effective = self.policy.effective_size(parallel, pool_size, strategy);

        let state = Arc::new(RunState::new(&run_id, strategy, effective, units.len()));
        let (handle, signal) = cancel_pair();
        let entry = self.registry.insert(RunEntry::new(state.clone(), handle)).await;

        info!(
            run_id = %run_id,
            units = units.len(),
            pool_size = effective,
            requested = pool_size,
            parallel,
            strategy = %strategy,
            "Run submitted"
        );

        let dispatcher = Dispatcher {
            state,
            units,
            pool_size: effective,
            executors: self.executors.clone(),
            sink: self.sink.clone(),
            settings: self.settings.clone(),
            cancel: signal,
        };
        entry.attach_dispatcher(tokio::spawn(dispatcher.run()));

        run_id
    }

    /// Snapshot of a run; `NOT_FOUND` for unknown identifiers
    pub async fn status(&self, run_id: &str) -> RunSnapshot {
        self.registry.snapshot(run_id).await
    }

    /// Snapshots of every run, newest first
    pub async fn list(&self) -> Vec<RunSnapshot> {
        self.registry.list().await
    }

    /// Cancel a running run
    ///
    /// Returns false when the run is unknown or already terminal; the record
    /// is left untouched in that case.
    pub async fn cancel(&self, run_id: &str) -> bool {
        let Some(entry) = self.registry.get(run_id).await else {
            debug!(run_id = %run_id, "Cancel requested for unknown run");
            return false;
        };

        if !entry.state.finish(RunStatus::Cancelled, None) {
            debug!(run_id = %run_id, status = %entry.state.status(), "Run already finished");
            return false;
        }

        entry.cancel.cancel();
        info!(
            run_id = %run_id,
            completed = entry.state.completed(),
            total = entry.state.total(),
            "Run cancelled"
        );
        true
    }

    /// Cancel every run that is still running; returns how many were cancelled
    pub async fn cancel_active(&self) -> usize {
        let mut cancelled = 0;
        for snapshot in self.list().await {
            if snapshot.status == RunStatus::Running && self.cancel(&snapshot.run_id).await {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Poll until the run is terminal or unknown
    pub async fn wait_for(&self, run_id: &str) -> RunSnapshot {
        loop {
            let snapshot = self.status(run_id).await;
            if snapshot.status.is_terminal() || !snapshot.is_found() {
                return snapshot;
            }
            tokio::time::sleep(self.settings.status_poll).await;
        }
    }

    /// Submit one run per priority tier, HIGH first
    ///
    /// With `wait` set each tier must reach a terminal state before the next
    /// is submitted, and a tier that ends cancelled or interrupted stops the
    /// remaining tiers.
    pub async fn run_priority_tiers(
        &self,
        test_cases: Vec<TestCase>,
        parallel: bool,
        pool_size: usize,
        wait: bool,
    ) -> Vec<String> {
        let mut run_ids = Vec::new();

        for tier in Priority::descending() {
            let tier_cases: Vec<TestCase> = test_cases
                .iter()
                .filter(|c| c.priority == tier)
                .cloned()
                .collect();
            if tier_cases.is_empty() {
                continue;
            }

            let run_id = self
                .submit(tier_cases, parallel, pool_size, Strategy::PriorityBased)
                .await;
            info!(run_id = %run_id, tier = %tier, "Priority tier submitted");
            run_ids.push(run_id.clone());

            if wait {
                let snapshot = self.wait_for(&run_id).await;
                if matches!(snapshot.status, RunStatus::Cancelled | RunStatus::Interrupted) {
                    warn!(run_id = %run_id, tier = %tier, status = %snapshot.status, "Stopping remaining tiers");
                    break;
                }
            }
        }

        run_ids
    }

    /// Interrupt every running run; returns how many were interrupted
    pub async fn shutdown(&self) -> usize {
        let mut interrupted = 0;
        for entry in self.registry.entries().await {
            if entry
                .state
                .finish(RunStatus::Interrupted, Some("Coordinator shut down".to_string()))
            {
                entry.cancel.cancel();
                entry.abort_dispatcher();
                interrupted += 1;
            }
        }
        if interrupted > 0 {
            warn!("Interrupted {} running run(s)", interrupted);
        }
        interrupted
    }
}

/// Everything one run's dispatcher task owns
struct Dispatcher {
    state: Arc<RunState>,
    units: Vec<ExecutionUnit>,
    pool_size: usize,
    executors: ExecutorSet,
    sink: Arc<dyn ResultSink>,
    settings: EngineSettings,
    cancel: CancelSignal,
}

impl Dispatcher {
    async fn run(self) {
        let Dispatcher {
            state,
            units,
            pool_size,
            executors,
            sink,
            settings,
            mut cancel,
        } = self;
        let _guard = DispatchGuard(state.clone());
        let run_id = state.run_id().to_string();

        if let Some(missing) = units
            .iter()
            .map(|u| u.case.test_type)
            .find(|t| !executors.supports(*t))
        {
            fail_run(&state, &EngineError::MissingExecutor(missing));
            return;
        }

        let mut pool = match WorkerPool::new(pool_size, settings.backlog_capacity) {
            Ok(pool) => pool,
            Err(e) => {
                fail_run(&state, &e);
                return;
            }
        };

        for unit in units {
            if cancel.is_cancelled() {
                break;
            }
            let Some(executor) = executors.get(unit.case.test_type) else {
                fail_run(&state, &EngineError::MissingExecutor(unit.case.test_type));
                pool.shutdown(settings.shutdown_grace).await;
                return;
            };

            let job = execute_unit(
                unit,
                executor,
                state.clone(),
                sink.clone(),
                settings.retry_backoff,
                cancel.clone(),
            );

            let submitted = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                submitted = pool.submit(job) => submitted,
            };
            if let Err(e) = submitted {
                fail_run(&state, &e);
                pool.shutdown(settings.shutdown_grace).await;
                return;
            }
        }

        pool.seal();
        debug!(run_id = %run_id, submitted = pool.submitted(), "All units handed to the pool");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = pool.join_next() => {
                    if next.is_none() {
                        break;
                    }
                }
            }
        }

        let cancelled = cancel.is_cancelled();
        pool.shutdown(settings.shutdown_grace).await;

        if cancelled {
            info!(run_id = %run_id, status = %state.status(), completed = state.completed(), "Run stopped");
        } else if state.finish(RunStatus::Completed, None) {
            let summary = state.snapshot().summary();
            info!(
                run_id = %run_id,
                passed = summary.passed,
                failed = summary.failed,
                "Run completed in {}ms",
                summary.total_duration_ms
            );
        }
    }
}

/// Run one unit through the retry loop and record its outcome
async fn execute_unit(
    unit: ExecutionUnit,
    executor: Arc<dyn TestExecutor>,
    state: Arc<RunState>,
    sink: Arc<dyn ResultSink>,
    backoff: Duration,
    cancel: CancelSignal,
) {
    let outcome = retry::run_unit(&unit, executor, backoff, &cancel).await;
    debug!(run_id = %unit.run_id, "{}", outcome);

    if !state.record_outcome(outcome.clone()) {
        return;
    }

    // Sinks write files, keep them off the runtime threads
    let unit_id = outcome.test_case_id.clone();
    let run_id = unit.run_id;
    let saved = {
        let run_id = run_id.clone();
        tokio::task::spawn_blocking(move || sink.save(&run_id, &outcome)).await
    };
    match saved {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(run_id = %run_id, unit = %unit_id, "Failed to persist outcome: {:#}", e),
        Err(e) => warn!(run_id = %run_id, unit = %unit_id, "Result sink task failed: {}", e),
    }
}

fn fail_run(state: &RunState, error: &EngineError) {
    error!(run_id = %state.run_id(), "Run failed: {}", error);
    state.finish(RunStatus::Failed, Some(error.to_string()));
}

/// Marks the run interrupted if the dispatcher goes away while it is running
struct DispatchGuard(Arc<RunState>);

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        if self.0.status() != RunStatus::Running {
            return;
        }
        let (status, reason) = if std::thread::panicking() {
            (RunStatus::Failed, "Dispatcher panicked")
        } else {
            (RunStatus::Interrupted, "Dispatcher interrupted")
        };
        if self.0.finish(status, Some(reason.to_string())) {
            warn!(run_id = %self.0.run_id(), status = %status, "{}", reason);
        }
    }
}

/// Generate a unique run ID
fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let sequence = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let random: u32 = rand::random::<u32>() % 10000;
    format!("run_{timestamp}_{sequence:04}_{random:04}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExecutionReport, OutcomeStatus, TestType};
    use crate::results::MemorySink;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    type Behavior = dyn Fn(&str) -> anyhow::Result<ExecutionReport> + Send + Sync;

    /// Executor that logs calls and delegates to a closure
    struct Scripted {
        behavior: Box<Behavior>,
        delay: Duration,
        calls: AtomicUsize,
        log: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(behavior: impl Fn(&str) -> anyhow::Result<ExecutionReport> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                behavior: Box::new(behavior),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                log: Mutex::new(Vec::new()),
            })
        }

        fn passing() -> Arc<Self> {
            Self::new(|f| Ok(ExecutionReport::passed(f)))
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                behavior: Box::new(|f| Ok(ExecutionReport::passed(f))),
                delay,
                calls: AtomicUsize::new(0),
                log: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl TestExecutor for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn execute(
            &self,
            functionality: &str,
            _payload: &serde_json::Value,
            _timeout: Duration,
        ) -> anyhow::Result<ExecutionReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(functionality.to_string());
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            (self.behavior)(functionality)
        }
    }

    /// Blocks the calling thread on every save
    struct SlowSink(Duration);

    impl ResultSink for SlowSink {
        fn save(&self, _run_id: &str, _outcome: &crate::models::Outcome) -> anyhow::Result<()> {
            std::thread::sleep(self.0);
            Ok(())
        }
    }

    struct FailingSink;

    impl ResultSink for FailingSink {
        fn save(&self, _run_id: &str, _outcome: &crate::models::Outcome) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn fast_settings() -> EngineSettings {
        EngineSettings {
            retry_backoff: Duration::from_millis(5),
            backlog_capacity: DEFAULT_BACKLOG,
            shutdown_grace: Duration::from_millis(500),
            status_poll: Duration::from_millis(5),
        }
    }

    fn coordinator(executor: Arc<Scripted>, sink: Arc<dyn ResultSink>) -> RunCoordinator {
        let executors = ExecutorSet::new()
            .with(TestType::Ui, executor.clone())
            .with(TestType::Api, executor);
        RunCoordinator::new(RunRegistry::new(), executors, sink)
            .with_policy(PoolPolicy::with_cores(4))
            .with_settings(fast_settings())
    }

    async fn wait(coordinator: &RunCoordinator, run_id: &str) -> RunSnapshot {
        tokio::time::timeout(Duration::from_secs(10), coordinator.wait_for(run_id))
            .await
            .expect("run did not finish in time")
    }

    #[tokio::test]
    async fn test_run_completes_with_one_outcome_per_unit() {
        let executor = Scripted::passing();
        let sink = Arc::new(MemorySink::new());
        let coordinator = coordinator(executor.clone(), sink.clone());

        let cases: Vec<TestCase> = (0..5)
            .map(|i| TestCase::api(format!("a{i}"), format!("f{i}")))
            .collect();
        let run_id = coordinator.submit(cases, true, 3, Strategy::Balanced).await;

        let snapshot = wait(&coordinator, &run_id).await;
        assert_eq!(snapshot.status, RunStatus::Completed);
        assert_eq!(snapshot.total_units, 5);
        assert_eq!(snapshot.completed_units, 5);
        assert_eq!(snapshot.outcomes.len(), 5);
        assert!(snapshot.ended_at.is_some());
        assert_eq!(snapshot.pool_size, 3);

        let ids: HashSet<&str> = snapshot.outcomes.iter().map(|o| o.test_case_id.as_str()).collect();
        assert_eq!(ids.len(), 5);
        assert_eq!(executor.calls(), 5);
        assert_eq!(sink.outcomes(&run_id).len(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_type_grouped_serial_runs_api_before_ui() {
        let executor = Scripted::passing();
        let coordinator = coordinator(executor.clone(), Arc::new(MemorySink::new()));

        let cases = vec![
            TestCase::ui("u1", "ui-1"),
            TestCase::api("a1", "api-1"),
            TestCase::ui("u2", "ui-2"),
            TestCase::api("a2", "api-2"),
        ];
        let run_id = coordinator.submit(cases, false, 8, Strategy::TypeGrouped).await;
        let snapshot = wait(&coordinator, &run_id).await;

        assert_eq!(snapshot.status, RunStatus::Completed);
        assert_eq!(snapshot.pool_size, 1);
        assert_eq!(executor.log(), vec!["api-1", "api-2", "ui-1", "ui-2"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_type_grouped_serial_keeps_order_with_many_units() {
        let executor = Scripted::passing();
        let coordinator = coordinator(executor.clone(), Arc::new(MemorySink::new()));

        let mut cases = Vec::new();
        for i in 0..10 {
            cases.push(TestCase::ui(format!("u{i}"), format!("ui-{i}")));
        }
        for i in 0..10 {
            cases.push(TestCase::api(format!("a{i}"), format!("api-{i}")));
        }

        for _ in 0..5 {
            let run_id = coordinator
                .submit(cases.clone(), false, 8, Strategy::TypeGrouped)
                .await;
            assert_eq!(wait(&coordinator, &run_id).await.status, RunStatus::Completed);
        }

        let expected: Vec<String> = (0..10)
            .map(|i| format!("api-{i}"))
            .chain((0..10).map(|i| format!("ui-{i}")))
            .collect();
        for round in executor.log().chunks(20) {
            assert_eq!(round, expected.as_slice());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sequential_runs_in_input_order() {
        let executor = Scripted::passing();
        let coordinator = coordinator(executor.clone(), Arc::new(MemorySink::new()));

        let cases: Vec<TestCase> = (0..15)
            .map(|i| {
                let case = if i % 3 == 0 {
                    TestCase::ui(format!("c{i}"), format!("step-{i}"))
                } else {
                    TestCase::api(format!("c{i}"), format!("step-{i}"))
                };
                case.with_priority(if i % 2 == 0 { Priority::Low } else { Priority::High })
            })
            .collect();

        let run_id = coordinator.submit(cases, true, 8, Strategy::Sequential).await;
        let snapshot = wait(&coordinator, &run_id).await;

        assert_eq!(snapshot.pool_size, 1);
        let expected: Vec<String> = (0..15).map(|i| format!("step-{i}")).collect();
        assert_eq!(executor.log(), expected);
        let recorded: Vec<&str> = snapshot.outcomes.iter().map(|o| o.test_case_id.as_str()).collect();
        let ids: Vec<String> = (0..15).map(|i| format!("c{i}")).collect();
        assert_eq!(recorded, ids.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_always_throwing_executor_completes_run() {
        let executor = Scripted::new(|_| anyhow::bail!("selenium unreachable"));
        let coordinator = coordinator(executor.clone(), Arc::new(MemorySink::new()));

        let cases = vec![TestCase::ui("u1", "login").with_retries(2)];
        let run_id = coordinator.submit(cases, false, 1, Strategy::Sequential).await;
        let snapshot = wait(&coordinator, &run_id).await;

        assert_eq!(snapshot.status, RunStatus::Completed);
        assert_eq!(snapshot.outcomes.len(), 1);
        assert_eq!(snapshot.outcomes[0].status, OutcomeStatus::Failed);
        assert_eq!(snapshot.outcomes[0].attempts, 3);
        assert_eq!(executor.calls(), 3);
    }

    #[tokio::test]
    async fn test_balanced_pool_capped_by_cores() {
        let coordinator = coordinator(Scripted::passing(), Arc::new(MemorySink::new()));
        let cases: Vec<TestCase> = (0..5)
            .map(|i| TestCase::api(format!("a{i}"), "f"))
            .collect();

        let run_id = coordinator.submit(cases, true, 10, Strategy::Balanced).await;
        let snapshot = wait(&coordinator, &run_id).await;
        assert_eq!(snapshot.pool_size, 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_progress_is_monotonic() {
        let executor = Scripted::slow(Duration::from_millis(15));
        let coordinator = coordinator(executor, Arc::new(MemorySink::new()));
        let cases: Vec<TestCase> = (0..6)
            .map(|i| TestCase::api(format!("a{i}"), "f"))
            .collect();

        let run_id = coordinator.submit(cases, true, 2, Strategy::Balanced).await;

        let mut seen = Vec::new();
        loop {
            let snapshot = coordinator.status(&run_id).await;
            assert!(snapshot.completed_units <= snapshot.total_units);
            assert_eq!(snapshot.completed_units, snapshot.outcomes.len());
            seen.push(snapshot.completed_units);
            if snapshot.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(3)).await;
        }

        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&6));
    }

    #[tokio::test]
    async fn test_status_is_idempotent() {
        let coordinator = coordinator(Scripted::passing(), Arc::new(MemorySink::new()));
        let run_id = coordinator
            .submit(vec![TestCase::api("a", "f")], false, 1, Strategy::Sequential)
            .await;
        wait(&coordinator, &run_id).await;

        let first = serde_json::to_string(&coordinator.status(&run_id).await).unwrap();
        let second = serde_json::to_string(&coordinator.status(&run_id).await).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_run_is_not_found() {
        let coordinator = coordinator(Scripted::passing(), Arc::new(MemorySink::new()));
        assert_eq!(coordinator.status("run_missing").await.status, RunStatus::NotFound);
        assert!(!coordinator.cancel("run_missing").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_stops_run_and_is_one_shot() {
        let executor = Scripted::slow(Duration::from_millis(100));
        let coordinator = coordinator(executor.clone(), Arc::new(MemorySink::new()));
        let cases: Vec<TestCase> = (0..10)
            .map(|i| TestCase::api(format!("a{i}"), "f"))
            .collect();

        let run_id = coordinator.submit(cases, false, 1, Strategy::Sequential).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(coordinator.cancel(&run_id).await);
        let cancelled = coordinator.status(&run_id).await;
        assert_eq!(cancelled.status, RunStatus::Cancelled);
        assert!(cancelled.ended_at.is_some());

        assert!(!coordinator.cancel(&run_id).await);
        let again = coordinator.status(&run_id).await;
        assert_eq!(again.status, RunStatus::Cancelled);
        assert_eq!(again.ended_at, cancelled.ended_at);

        // Let the dispatcher quiesce
        tokio::time::sleep(Duration::from_millis(700)).await;
        let settled = coordinator.status(&run_id).await;
        assert!(settled.outcomes.len() < settled.total_units);
        let calls = executor.calls();
        assert!(calls < 10);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(executor.calls(), calls);
    }

    #[tokio::test]
    async fn test_cancel_on_terminal_run_leaves_record_unchanged() {
        let coordinator = coordinator(Scripted::passing(), Arc::new(MemorySink::new()));
        let run_id = coordinator
            .submit(vec![TestCase::ui("u", "f")], false, 1, Strategy::Balanced)
            .await;
        let finished = wait(&coordinator, &run_id).await;

        assert!(!coordinator.cancel(&run_id).await);
        assert_eq!(coordinator.status(&run_id).await, finished);
    }

    #[tokio::test]
    async fn test_zero_pool_size_fails_run() {
        let coordinator = coordinator(Scripted::passing(), Arc::new(MemorySink::new()));
        let run_id = coordinator
            .submit(vec![TestCase::api("a", "f")], true, 0, Strategy::Balanced)
            .await;
        let snapshot = wait(&coordinator, &run_id).await;

        assert_eq!(snapshot.status, RunStatus::Failed);
        assert!(snapshot.failure_reason.unwrap().contains("Invalid pool size 0"));
        assert!(snapshot.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_missing_executor_fails_run() {
        let executors = ExecutorSet::new().with(TestType::Api, Scripted::passing());
        let coordinator = RunCoordinator::new(RunRegistry::new(), executors, Arc::new(MemorySink::new()))
            .with_settings(fast_settings());

        let run_id = coordinator
            .submit(vec![TestCase::api("a", "f"), TestCase::ui("u", "f")], false, 1, Strategy::Balanced)
            .await;
        let snapshot = wait(&coordinator, &run_id).await;

        assert_eq!(snapshot.status, RunStatus::Failed);
        assert!(snapshot.failure_reason.unwrap().contains("UI"));
    }

    #[tokio::test]
    async fn test_sink_failures_do_not_fail_the_run() {
        let coordinator = coordinator(Scripted::passing(), Arc::new(FailingSink));
        let run_id = coordinator
            .submit(vec![TestCase::api("a", "f"), TestCase::api("b", "f")], true, 2, Strategy::Balanced)
            .await;
        let snapshot = wait(&coordinator, &run_id).await;

        assert_eq!(snapshot.status, RunStatus::Completed);
        assert_eq!(snapshot.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_slow_sink_does_not_stall_status() {
        let coordinator = coordinator(Scripted::passing(), Arc::new(SlowSink(Duration::from_millis(400))));
        let started = std::time::Instant::now();
        let run_id = coordinator
            .submit(vec![TestCase::api("a", "f")], false, 1, Strategy::Sequential)
            .await;

        loop {
            let snapshot = coordinator.status(&run_id).await;
            if snapshot.completed_units == 1 {
                break;
            }
            assert!(started.elapsed() < Duration::from_secs(5));
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(started.elapsed() < Duration::from_millis(300));

        let snapshot = wait(&coordinator, &run_id).await;
        assert_eq!(snapshot.status, RunStatus::Completed);
        assert!(started.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_empty_run_completes() {
        let coordinator = coordinator(Scripted::passing(), Arc::new(MemorySink::new()));
        let run_id = coordinator.submit(Vec::new(), true, 4, Strategy::Balanced).await;
        let snapshot = wait(&coordinator, &run_id).await;

        assert_eq!(snapshot.status, RunStatus::Completed);
        assert_eq!(snapshot.total_units, 0);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_running_runs() {
        let coordinator = coordinator(Scripted::slow(Duration::from_millis(100)), Arc::new(MemorySink::new()));
        let cases: Vec<TestCase> = (0..5)
            .map(|i| TestCase::api(format!("a{i}"), "f"))
            .collect();
        let run_id = coordinator.submit(cases, false, 1, Strategy::Sequential).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(coordinator.shutdown().await, 1);
        let snapshot = coordinator.status(&run_id).await;
        assert_eq!(snapshot.status, RunStatus::Interrupted);
        assert!(snapshot.ended_at.is_some());
        assert!(!coordinator.cancel(&run_id).await);
        assert_eq!(coordinator.shutdown().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_priority_tiers_run_in_order_when_waiting() {
        let executor = Scripted::passing();
        let coordinator = coordinator(executor.clone(), Arc::new(MemorySink::new()));
        let cases = vec![
            TestCase::api("l", "low").with_priority(Priority::Low),
            TestCase::api("h1", "high").with_priority(Priority::High),
            TestCase::ui("m", "medium").with_priority(Priority::Medium),
            TestCase::ui("h2", "high").with_priority(Priority::High),
        ];

        let run_ids = coordinator.run_priority_tiers(cases, true, 4, true).await;
        assert_eq!(run_ids.len(), 3);

        for run_id in &run_ids {
            assert_eq!(coordinator.status(run_id).await.status, RunStatus::Completed);
        }
        assert_eq!(coordinator.status(&run_ids[0]).await.total_units, 2);
        assert_eq!(executor.log(), vec!["high", "high", "medium", "low"]);
        assert_eq!(coordinator.list().await.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_during_tier_wait_stops_remaining_tiers() {
        let executor = Scripted::slow(Duration::from_millis(50));
        let coordinator = coordinator(executor.clone(), Arc::new(MemorySink::new()));
        let cases = vec![
            TestCase::api("h1", "high").with_priority(Priority::High),
            TestCase::api("h2", "high").with_priority(Priority::High),
            TestCase::api("h3", "high").with_priority(Priority::High),
            TestCase::api("h4", "high").with_priority(Priority::High),
            TestCase::api("m", "medium").with_priority(Priority::Medium),
            TestCase::api("l", "low").with_priority(Priority::Low),
        ];

        let tiers = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run_priority_tiers(cases, false, 1, true).await })
        };
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(coordinator.cancel_active().await, 1);

        let run_ids = tokio::time::timeout(Duration::from_secs(5), tiers)
            .await
            .expect("tiers did not stop")
            .unwrap();
        assert_eq!(run_ids.len(), 1);
        assert_eq!(coordinator.status(&run_ids[0]).await.status, RunStatus::Cancelled);
        assert!(!executor.log().iter().any(|f| f == "medium" || f == "low"));
        assert_eq!(coordinator.cancel_active().await, 0);
    }

    #[test]
    fn test_run_ids_are_unique() {
        let ids: HashSet<String> = (0..500).map(|_| generate_run_id()).collect();
        assert_eq!(ids.len(), 500);
        assert!(ids.iter().all(|id| id.starts_with("run_")));
    }
}
