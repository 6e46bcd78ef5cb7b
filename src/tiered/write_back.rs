//! Write-Back Queue
//!
//! Deferred propagation for the write-back strategy. Jobs go into a bounded
//! channel drained by a single worker task, which waits until each job is due
//! and then writes its remaining tiers. The queue can be drained (await every
//! queued write) or shut down (cancel the worker and drop queued writes).
//!
//! Each queued key carries a generation. A job only writes if its generation
//! is still the latest for its key, so a newer write or an invalidation of the
//! key cancels it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use globset::GlobMatcher;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{CacheTier, Tiers};

// == Config ==
#[derive(Debug, Clone, Copy)]
pub struct WriteBackConfig {
    /// Maximum number of queued jobs
    pub capacity: usize,
    /// Delay between enqueue and the deferred write
    pub delay: Duration,
}

impl Default for WriteBackConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            delay: Duration::from_millis(100),
        }
    }
}

// == Job ==
/// Writes still owed to the slower tiers.
#[derive(Debug)]
pub struct WriteBackJob {
    pub key: String,
    pub value: Value,
    pub ttl: Option<u64>,
    pub tiers: Vec<CacheTier>,
    due: Instant,
    generation: u64,
}

/// Latest generation queued per key.
type Generations = Arc<Mutex<HashMap<String, u64>>>;

/// Claims the job if it is still the latest for its key.
fn claim(generations: &Generations, job: &WriteBackJob) -> bool {
    let mut latest = generations.lock();
    if latest.get(&job.key) == Some(&job.generation) {
        latest.remove(&job.key);
        true
    } else {
        false
    }
}

// == Queue ==
pub struct WriteBackQueue {
    sender: mpsc::Sender<WriteBackJob>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    generations: Generations,
    next_generation: AtomicU64,
    closed: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    delay: Duration,
}

impl WriteBackQueue {
    /// Starts the worker. Must be called from within a tokio runtime.
    pub(crate) fn spawn(tiers: Tiers, config: WriteBackConfig) -> Self {
        let (sender, mut receiver) = mpsc::channel::<WriteBackJob>(config.capacity.max(1));
        let pending = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());
        let generations: Generations = Arc::new(Mutex::new(HashMap::new()));

        let worker_pending = Arc::clone(&pending);
        let worker_idle = Arc::clone(&idle);
        let worker_generations = Arc::clone(&generations);
        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                tokio::time::sleep_until(job.due).await;

                if claim(&worker_generations, &job) {
                    for tier in &job.tiers {
                        tiers.write(*tier, &job.key, &job.value, job.ttl).await;
                    }
                    debug!(key = %job.key, tiers = ?job.tiers, "Write-back completed");
                } else {
                    debug!(key = %job.key, "Write-back superseded");
                }

                if release(&worker_pending) == Some(1) {
                    worker_idle.notify_waiters();
                }
            }
        });

        Self {
            sender,
            pending,
            idle,
            generations,
            next_generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
            delay: config.delay,
        }
    }

    // == Enqueue ==
    /// Queues a deferred write, superseding any write still queued for the key.
    /// Hands the job back if the queue is full or shut down.
    pub(crate) fn enqueue(
        &self,
        key: String,
        value: Value,
        ttl: Option<u64>,
        tiers: Vec<CacheTier>,
    ) -> Result<(), WriteBackJob> {
        let job = WriteBackJob {
            key,
            value,
            ttl,
            tiers,
            due: Instant::now() + self.delay,
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed) + 1,
        };

        if self.closed.load(Ordering::SeqCst) {
            self.cancel(&job.key);
            return Err(job);
        }

        self.pending.fetch_add(1, Ordering::SeqCst);
        // shutdown may have zeroed `pending` between the check above and the increment
        if self.closed.load(Ordering::SeqCst) {
            self.release_one();
            self.cancel(&job.key);
            return Err(job);
        }

        self.generations
            .lock()
            .insert(job.key.clone(), job.generation);
        match self.sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.release_one();
                let job = match e {
                    mpsc::error::TrySendError::Full(job) => {
                        warn!(key = %job.key, "Write-back queue full");
                        job
                    }
                    mpsc::error::TrySendError::Closed(job) => job,
                };
                // the caller writes this value now, so nothing queued may overwrite it
                self.cancel(&job.key);
                Err(job)
            }
        }
    }

    // == Cancel ==
    /// Drops the queued write for `key`, if any.
    pub(crate) fn cancel(&self, key: &str) {
        self.generations.lock().remove(key);
    }

    /// Drops queued writes for every key the matcher accepts. Returns how many.
    pub(crate) fn cancel_matching(&self, matcher: &GlobMatcher) -> usize {
        let mut latest = self.generations.lock();
        let before = latest.len();
        latest.retain(|key, _| !matcher.is_match(key.as_str()));
        before - latest.len()
    }

    fn release_one(&self) {
        if release(&self.pending) == Some(1) {
            self.idle.notify_waiters();
        }
    }

    // == Drain ==
    /// Waits until every queued write has been applied.
    pub async fn drain(&self) {
        loop {
            let notified = self.idle.notified();
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    // == Shutdown ==
    /// Cancels the worker and drops queued writes, returning how many were dropped.
    pub fn shutdown(&self) -> usize {
        if self.closed.swap(true, Ordering::SeqCst) {
            return 0;
        }

        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
        self.generations.lock().clear();

        let dropped = self.pending.swap(0, Ordering::SeqCst);
        self.idle.notify_waiters();
        if dropped > 0 {
            warn!(dropped, "Write-back queue shut down with pending writes");
        } else {
            info!("Write-back queue shut down");
        }
        dropped
    }

    /// Number of queued writes not yet applied.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// Decrements the pending counter without wrapping; returns the previous value.
fn release(pending: &AtomicUsize) -> Option<usize> {
    pending
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .ok()
}
