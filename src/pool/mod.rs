//! Fixed-size worker pool.
//!
//! # Data Flow
//! ```text
//! schedule(job)
//!     → unbounded FIFO queue (one per pool, shared by all workers)
//!     → idle worker dequeues
//!     → job runs inside a panic boundary
//!     → worker returns to the dequeue point
//!
//! shutdown()
//!     → one Exit marker per worker, behind everything already queued
//!     → each worker consumes exactly one marker and terminates
//!     → shutdown awaits every join handle
//! ```
//!
//! # Design Decisions
//! - Workers are durable: spawning a task per connection would churn, so a
//!   fixed set of long-lived tasks drains the queue instead
//! - A job is a closure capturing all of its state; the pool knows nothing
//!   about what runs
//! - The shutdown marker is a typed `Job::Exit` variant, matched before the
//!   failure boundary so a recovery path can never swallow it
//! - Per-worker executed-job counters make scheduling observable

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A scheduled unit of work: a closure producing the future to run.
type BoxedJob = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Queue entries. `Exit` terminates the receiving worker.
enum Job {
    Work(BoxedJob),
    Exit,
}

/// Receiver end of the job queue, shared by every worker.
type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>>;

/// A fixed set of long-lived workers draining one FIFO job queue.
pub struct WorkerPool {
    tx: mpsc::UnboundedSender<Job>,
    handles: Vec<JoinHandle<()>>,
    executed: Arc<Vec<AtomicU64>>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` workers with identities `0..size`.
    ///
    /// # Panics
    /// Panics if `size` is 0.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "worker pool size must be > 0");
        let (tx, rx) = mpsc::unbounded_channel();
        let rx: SharedReceiver = Arc::new(tokio::sync::Mutex::new(rx));
        let executed: Arc<Vec<AtomicU64>> =
            Arc::new((0..size).map(|_| AtomicU64::new(0)).collect());
        let handles = (0..size)
            .map(|id| {
                let rx = Arc::clone(&rx);
                let executed = Arc::clone(&executed);
                tokio::spawn(worker_loop(id, rx, executed))
            })
            .collect();
        Self {
            tx,
            handles,
            executed,
            size,
        }
    }

    /// Enqueue a job. The queue is unbounded, so this never blocks.
    ///
    /// Returns `false` if the pool is no longer accepting work.
    pub fn schedule<F, Fut>(&self, job: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.tx
            .send(Job::Work(Box::new(move || Box::pin(job()))))
            .is_ok()
    }

    /// Drain the queue and stop every worker.
    ///
    /// FIFO ordering guarantees all previously scheduled jobs run to
    /// completion before the exit markers are consumed.
    pub async fn shutdown(mut self) {
        for _ in 0..self.size {
            let _ = self.tx.send(Job::Exit);
        }
        for handle in self.handles.drain(..) {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "worker task failed to join");
            }
        }
        tracing::debug!(workers = self.size, "worker pool stopped");
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Jobs executed per worker id, panicked jobs included.
    pub fn executed_counts(&self) -> Vec<u64> {
        self.executed
            .iter()
            .map(|count| count.load(Ordering::Relaxed))
            .collect()
    }
}

/// One worker: dequeue, run, recover, repeat.
async fn worker_loop(id: usize, rx: SharedReceiver, executed: Arc<Vec<AtomicU64>>) {
    tracing::debug!(worker = id, "worker started");
    loop {
        // Hold the receiver lock only across the dequeue, never while a job
        // runs.
        let job = { rx.lock().await.recv().await };
        match job {
            None => break,
            Some(Job::Exit) => {
                tracing::debug!(worker = id, "worker exiting");
                break;
            }
            Some(Job::Work(make)) => {
                let outcome = AssertUnwindSafe(async move { make().await })
                    .catch_unwind()
                    .await;
                executed[id].fetch_add(1, Ordering::Relaxed);
                if let Err(panic) = outcome {
                    tracing::error!(
                        worker = id,
                        "job panicked: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
