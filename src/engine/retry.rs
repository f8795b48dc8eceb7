//! Per-unit retry loop
//!
//! A unit gets one attempt plus `retry_count` retries with a fixed backoff.
//! The first success wins; when every attempt fails the last failure is
//! kept. Executor errors and panics are absorbed into FAILED outcomes.

use chrono::Utc;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cancel::CancelSignal;
use super::planner::ExecutionUnit;
use crate::executors::TestExecutor;
use crate::models::{ExecutionReport, Outcome, TestCase};
use crate::utils::UnitTimer;

/// Default pause between attempts
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Result of a single executor invocation
type Attempt = Result<ExecutionReport, String>;

/// Run one unit to its final outcome
///
/// Backoff waits observe `cancel`; a cancelled unit stops retrying and keeps
/// its last failure.
pub async fn run_unit(
    unit: &ExecutionUnit,
    executor: Arc<dyn TestExecutor>,
    backoff: Duration,
    cancel: &CancelSignal,
) -> Outcome {
    let case = &unit.case;
    let started_at = Utc::now();
    let timer = UnitTimer::start(&unit.run_id, &case.id);
    let max_attempts = case.retry_count.saturating_add(1);
    let mut cancel = cancel.clone();

    let mut attempts = 0;
    let mut stopped = false;
    let last = loop {
        attempts += 1;
        let attempt = invoke(executor.clone(), case).await;

        match &attempt {
            Ok(report) if report.success => {
                debug!(run_id = %unit.run_id, unit = %case.id, attempt = attempts, "Unit passed");
                break attempt;
            }
            Ok(report) => debug!(
                run_id = %unit.run_id,
                unit = %case.id,
                attempt = attempts,
                "Attempt failed: {}",
                report.error_message.as_deref().unwrap_or(&report.detail)
            ),
            Err(e) => warn!(
                run_id = %unit.run_id,
                unit = %case.id,
                attempt = attempts,
                "Executor error: {}",
                e
            ),
        }

        if attempts >= max_attempts {
            break attempt;
        }
        if cancel.is_cancelled() {
            stopped = true;
            break attempt;
        }

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = cancel.cancelled() => {
                stopped = true;
                break attempt;
            }
        }
        info!(run_id = %unit.run_id, unit = %case.id, "Retrying ({}/{})", attempts, case.retry_count);
    };

    let mut outcome = match last {
        Ok(report) => Outcome::from_report(case, report, attempts, started_at),
        Err(e) => Outcome::from_error(case, e, attempts, started_at),
    };
    if stopped {
        outcome.detail.push_str(" (retries stopped: run cancelled)");
    }

    timer.stop(attempts);
    outcome
}

/// Call the blocking executor on the blocking pool
async fn invoke(executor: Arc<dyn TestExecutor>, case: &TestCase) -> Attempt {
    let functionality = case.functionality.clone();
    let payload = case.data.clone();
    let timeout = Duration::from_secs(case.timeout_secs);

    let joined = tokio::task::spawn_blocking(move || {
        executor.execute(&functionality, &payload, timeout)
    })
    .await;

    match joined {
        Ok(Ok(report)) => Ok(report),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(e) if e.is_panic() => Err(format!("Executor panicked: {}", panic_message(e.into_panic()))),
        Err(e) => Err(e.to_string()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
