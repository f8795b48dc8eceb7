//! Worker pool manager
//!
//! Sizes the per-run pool from the strategy and requested concurrency. A
//! fixed set of worker tasks pulls units from a bounded queue in the order
//! they were submitted; the queue is the backlog. Once it is full the
//! submitting dispatcher runs the unit itself instead of rejecting it.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use super::error::{EngineError, EngineResult};
use super::planner::Strategy;

/// Default number of units that may wait for a free worker
pub const DEFAULT_BACKLOG: usize = 100;

type Job = BoxFuture<'static, ()>;

/// Pool sizing policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolPolicy {
    available_cores: usize,
}

impl PoolPolicy {
    /// Use the hardware concurrency reported by the OS
    pub fn detect() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_cores(cores)
    }

    pub fn with_cores(available_cores: usize) -> Self {
        Self {
            available_cores: available_cores.max(1),
        }
    }

    /// Upper bound on workers for a parallel run under `strategy`
    pub fn ceiling(&self, strategy: Strategy) -> usize {
        match strategy {
            Strategy::Balanced => self.available_cores * 2,
            Strategy::TypeGrouped => self.available_cores,
            Strategy::PriorityBased => self.available_cores * 3,
            Strategy::Sequential => 1,
        }
    }

    /// Effective worker count; serial runs always get one worker
    pub fn effective_size(&self, parallel: bool, requested: usize, strategy: Strategy) -> usize {
        if !parallel {
            return 1;
        }
        requested.min(self.ceiling(strategy))
    }
}

impl Default for PoolPolicy {
    fn default() -> Self {
        Self::detect()
    }
}

/// How a submitted unit was scheduled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    /// Placed on the queue for the next free worker
    Queued,
    /// Backlog was full, ran on the submitting task
    RanInline,
}

/// Bounded pool of unit workers owned by one run's dispatcher
pub struct WorkerPool {
    size: usize,
    backlog: usize,
    /// Dropped once the pool stops taking units
    queue: Option<mpsc::Sender<Job>>,
    /// Set when queued units should be dropped rather than started
    stopped: Arc<AtomicBool>,
    workers: JoinSet<()>,
    submitted: usize,
}

impl WorkerPool {
    /// Start `size` workers behind a queue of `backlog` slots
    pub fn new(size: usize, backlog: usize) -> EngineResult<Self> {
        if size == 0 {
            return Err(EngineError::InvalidPoolSize(size));
        }
        if backlog == 0 {
            return Err(EngineError::InvalidBacklog(backlog));
        }

        let (tx, rx) = mpsc::channel::<Job>(backlog);
        let rx = Arc::new(Mutex::new(rx));
        let stopped = Arc::new(AtomicBool::new(false));

        let mut workers = JoinSet::new();
        for worker in 0..size {
            workers.spawn(work_queue(worker, rx.clone(), stopped.clone()));
        }

        Ok(Self {
            size,
            backlog,
            queue: Some(tx),
            stopped,
            workers,
            submitted: 0,
        })
    }

    /// Units handed to workers or run inline so far
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Submit a unit of work, running it inline when the backlog is full
    pub async fn submit<F>(&mut self, job: F) -> EngineResult<Submission>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Some(queue) = &self.queue else {
            return Err(EngineError::PoolClosed(self.submitted));
        };

        match queue.try_send(job.boxed()) {
            Ok(()) => {
                self.submitted += 1;
                Ok(Submission::Queued)
            }
            Err(TrySendError::Full(job)) => {
                debug!(size = self.size, backlog = self.backlog, "Backlog full, running unit inline");
                self.submitted += 1;
                job.await;
                Ok(Submission::RanInline)
            }
            // Every worker is gone
            Err(TrySendError::Closed(_)) => Err(EngineError::PoolClosed(self.submitted)),
        }
    }

    /// Stop taking units; workers finish the backlog and then exit
    pub fn seal(&mut self) {
        self.queue = None;
    }

    /// Wait for the next worker to exit; `None` once all have
    ///
    /// Workers only exit after `seal` or `close`.
    pub async fn join_next(&mut self) -> Option<()> {
        let joined = self.workers.join_next().await?;
        if let Err(e) = joined {
            if e.is_panic() {
                error!("Worker task panicked: {}", e);
            }
        }
        Some(())
    }

    /// Stop taking units and drop the backlog; running units carry on
    pub fn close(&mut self) {
        self.stopped.store(true, Ordering::Release);
        self.queue = None;
    }

    /// Close the pool and wait up to `grace` for running units before aborting them
    pub async fn shutdown(mut self, grace: Duration) {
        self.close();

        let drained = tokio::time::timeout(grace, async {
            while self.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = self.workers.len(),
                "Worker pool did not drain within {}ms, aborting",
                grace.as_millis()
            );
            self.workers.abort_all();
            while self.workers.join_next().await.is_some() {}
        }
    }
}

/// Worker loop: take the next queued unit until the queue closes
async fn work_queue(worker: usize, queue: Arc<Mutex<mpsc::Receiver<Job>>>, stopped: Arc<AtomicBool>) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };
        if stopped.load(Ordering::Acquire) {
            break;
        }
        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
            error!(worker, "Unit panicked on worker");
        }
    }
    debug!(worker, "Worker exiting");
}
