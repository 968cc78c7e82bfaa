//! Bounded background refresh pool.
//!
//! A fixed set of worker tasks drains a bounded queue of refresh futures.
//! When every worker is busy and the queue is full, new submissions are
//! dropped - background refreshes are best-effort and must never slow down
//! or fail the foreground read path.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

type RefreshTask = Pin<Box<dyn Future<Output = ()> + Send>>;

// ============================================================================
// METRICS
// ============================================================================

/// Counters for refresh pool activity.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
    /// Tasks accepted into the queue since startup.
    pub submitted: AtomicU64,

    /// Tasks dropped at submission because the pool was saturated or shut
    /// down.
    pub dropped: AtomicU64,

    /// Tasks a worker ran to completion, counting contained failures too.
    pub completed: AtomicU64,

    /// Refreshes whose fetch failed. These are contained and logged, never
    /// surfaced to the read path; this counter is the only place they show.
    pub failed: AtomicU64,
}

impl RefreshMetrics {
    /// Get current snapshot of all counters.
    pub fn snapshot(&self) -> RefreshSnapshot {
        RefreshSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of refresh metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSnapshot {
    pub submitted: u64,
    pub dropped: u64,
    pub completed: u64,
    pub failed: u64,
}

// ============================================================================
// POOL
// ============================================================================

/// Capped worker pool for background refreshes.
///
/// Must be created inside a Tokio runtime: workers are spawned eagerly so
/// bursts never pay task start-up latency.
pub struct RefreshPool {
    sender: mpsc::Sender<RefreshTask>,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    accepting: AtomicBool,
    metrics: Arc<RefreshMetrics>,
}

impl RefreshPool {
    /// Create a pool with `workers` worker tasks and a queue of
    /// `queue_capacity` pending refreshes. Both are clamped to at least 1.
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(RefreshMetrics::default());

        let worker_count = workers.max(1);
        let handles = (0..worker_count)
            .map(|_| {
                tokio::spawn(worker_loop(
                    Arc::clone(&receiver),
                    shutdown_rx.clone(),
                    Arc::clone(&metrics),
                ))
            })
            .collect();

        tracing::debug!(workers = worker_count, queue = queue_capacity.max(1), "Refresh pool started");

        Self {
            sender,
            shutdown_tx,
            workers: Mutex::new(handles),
            accepting: AtomicBool::new(true),
            metrics,
        }
    }

    /// Submit a refresh task. Returns `true` if it was queued; `false` means
    /// the task was dropped (pool saturated or shut down). Dropping is
    /// silent towards the read path - the caller must not treat it as an
    /// error.
    pub fn submit(&self, task: impl Future<Output = ()> + Send + 'static) -> bool {
        if !self.accepting.load(Ordering::Acquire) {
            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        match self.sender.try_send(Box::pin(task)) {
            Ok(()) => {
                self.metrics.submitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Refresh pool saturated; dropping submission");
                false
            }
        }
    }

    /// Current metrics snapshot.
    pub fn metrics(&self) -> RefreshSnapshot {
        self.metrics.snapshot()
    }

    /// Record a refresh whose fetch failed. The worker cannot see inside
    /// the opaque task, so the task reports its own failure here.
    pub fn record_failure(&self) {
        self.metrics.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Stop accepting work, give in-flight refreshes up to `grace` to
    /// finish, then abandon the rest. Idempotent.
    pub async fn shutdown(&self, grace: Duration) {
        self.accepting.store(false, Ordering::Release);
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<JoinHandle<()>> = match self.workers.lock() {
            Ok(mut workers) => workers.drain(..).collect(),
            Err(_) => return,
        };
        if handles.is_empty() {
            return;
        }

        let deadline = tokio::time::Instant::now() + grace;
        let mut abandoned = 0usize;
        for mut handle in handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(_) => {}
                Err(_) => {
                    handle.abort();
                    abandoned += 1;
                }
            }
        }
        if abandoned > 0 {
            tracing::warn!(abandoned, "Refresh workers still busy after grace period; abandoning");
        } else {
            tracing::debug!("Refresh pool drained");
        }
    }
}

async fn worker_loop(
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<RefreshTask>>>,
    mut shutdown_rx: watch::Receiver<bool>,
    metrics: Arc<RefreshMetrics>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        // The receiver lock is held only while waiting for the next task,
        // never while running one, so idle workers hand off immediately.
        let task = {
            let mut rx = receiver.lock().await;
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
                task = rx.recv() => task,
            }
        };
        match task {
            Some(task) => {
                task.await;
                metrics.completed.fetch_add(1, Ordering::Relaxed);
            }
            None => break,
        }
    }
}
