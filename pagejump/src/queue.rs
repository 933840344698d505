//! Admission-controlled executor for count queries.
//!
//! At most `concurrency` tasks run at once; the rest wait in a FIFO list of
//! at most `max_queue_size` entries. Waiting and running are each bounded by
//! `timeout`. A running task that times out is detached, not cancelled: the
//! caller gets [`QueueError::ExecutionTimeout`] and its slot is released,
//! while the spawned work finishes on its own.

use std::collections::VecDeque;
use std::future::Future;
use std::num::NonZeroUsize;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default maximum number of waiting tasks.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10_000;

/// Default wait and execution timeout (60s).
pub const DEFAULT_QUEUE_TIMEOUT_MS: u64 = 60_000;

/// Available parallelism clamped to `[4, 16]`.
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map_or(4, NonZeroUsize::get)
        .clamp(4, 16)
}

/// Queue limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of tasks running at once.
    pub concurrency: usize,
    /// Maximum number of tasks waiting for a slot.
    pub max_queue_size: usize,
    /// Bound applied separately to the wait and to the run.
    pub timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            timeout_ms: DEFAULT_QUEUE_TIMEOUT_MS,
        }
    }
}

impl QueueConfig {
    /// `timeout_ms` as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Why a task was not run to completion for its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum QueueError {
    /// The wait list was full; the task was never queued.
    #[error("count queue is full ({max_queue_size} waiting)")]
    QueueFull {
        /// Configured wait-list bound.
        max_queue_size: usize,
    },
    /// The task waited longer than the timeout for a slot.
    #[error("timed out after {0:?} waiting for a count slot")]
    WaitTimeout(Duration),
    /// The task ran longer than the timeout.
    #[error("count did not finish within {0:?}")]
    ExecutionTimeout(Duration),
    /// The spawned task panicked or was cancelled by the runtime.
    #[error("count task aborted")]
    Aborted,
}

impl QueueError {
    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::QueueFull { .. } => "QUEUE_FULL",
            Self::WaitTimeout(_) => "QUEUE_TIMEOUT",
            Self::ExecutionTimeout(_) => "EXECUTION_TIMEOUT",
            Self::Aborted => "QUEUE_ABORTED",
        }
    }

    /// Lower-case tag used in soft-failure records.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::QueueFull { .. } => "queue_full",
            Self::WaitTimeout(_) => "queue_timeout",
            Self::ExecutionTimeout(_) => "execution_timeout",
            Self::Aborted => "queue_aborted",
        }
    }
}

/// Snapshot of queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks that ran to completion.
    pub executed: u64,
    /// Tasks that had to wait for a slot.
    pub queued: u64,
    /// Wait and execution timeouts.
    pub timeouts: u64,
    /// Tasks rejected because the wait list was full.
    pub rejected: u64,
    /// Tasks holding a slot right now.
    pub running: usize,
    /// Tasks waiting right now.
    pub queued_now: usize,
    /// Mean time from submission to admission.
    pub avg_wait: Duration,
    /// Longest time from submission to admission.
    pub max_wait: Duration,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<()>,
}

#[derive(Default)]
struct State {
    running: usize,
    waiters: VecDeque<Waiter>,
    next_id: u64,
    executed: u64,
    queued: u64,
    timeouts: u64,
    rejected: u64,
    admitted: u64,
    total_wait: Duration,
    max_wait: Duration,
}

impl State {
    fn record_wait(&mut self, wait: Duration) {
        self.admitted += 1;
        self.total_wait += wait;
        self.max_wait = self.max_wait.max(wait);
    }

    /// Hand the slot to the next live waiter, or free it.
    fn release(&mut self) {
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.tx.send(()).is_ok() {
                return;
            }
        }
        self.running = self.running.saturating_sub(1);
    }
}

/// Bounded-concurrency, timeout-protected executor.
///
/// Owned by one engine; independent instances share nothing.
pub struct BoundedCountQueue {
    config: QueueConfig,
    state: Mutex<State>,
}

impl std::fmt::Debug for BoundedCountQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCountQueue")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for BoundedCountQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl BoundedCountQueue {
    /// Create a queue. A concurrency of zero is treated as one.
    #[must_use]
    pub fn new(mut config: QueueConfig) -> Self {
        config.concurrency = config.concurrency.max(1);
        Self {
            config,
            state: Mutex::new(State::default()),
        }
    }

    /// The effective configuration.
    #[must_use]
    pub const fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        let avg_wait = u32::try_from(state.admitted)
            .ok()
            .filter(|n| *n > 0)
            .map_or(Duration::ZERO, |n| state.total_wait / n);
        QueueStats {
            executed: state.executed,
            queued: state.queued,
            timeouts: state.timeouts,
            rejected: state.rejected,
            running: state.running,
            queued_now: state.waiters.len(),
            avg_wait,
            max_wait: state.max_wait,
        }
    }

    /// Run `task` once a slot is free.
    ///
    /// The task is spawned on the tokio runtime so that an execution timeout
    /// can release the caller without cancelling the work.
    pub async fn execute<F, T>(&self, task: F) -> Result<T, QueueError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let _slot = self.acquire().await?;
        let timeout = self.config.timeout();

        match tokio::time::timeout(timeout, tokio::spawn(task)).await {
            Ok(Ok(value)) => {
                self.state.lock().executed += 1;
                Ok(value)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "count task aborted");
                Err(QueueError::Aborted)
            }
            Err(_) => {
                self.state.lock().timeouts += 1;
                warn!(timeout_ms = self.config.timeout_ms, "count exceeded execution timeout; detaching");
                Err(QueueError::ExecutionTimeout(timeout))
            }
        }
    }

    async fn acquire(&self) -> Result<Slot<'_>, QueueError> {
        let (id, rx) = {
            let mut state = self.state.lock();
            if state.running < self.config.concurrency && state.waiters.is_empty() {
                state.running += 1;
                state.record_wait(Duration::ZERO);
                return Ok(Slot { queue: self });
            }
            if state.waiters.len() >= self.config.max_queue_size {
                state.rejected += 1;
                debug!(max_queue_size = self.config.max_queue_size, "count queue full");
                return Err(QueueError::QueueFull {
                    max_queue_size: self.config.max_queue_size,
                });
            }
            let id = state.next_id;
            state.next_id += 1;
            state.queued += 1;
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(Waiter { id, tx });
            (id, rx)
        };

        let enqueued_at = Instant::now();
        let mut pending = Pending {
            queue: self,
            id,
            rx,
            armed: true,
        };
        let timeout = self.config.timeout();

        let waited = tokio::time::timeout(timeout, &mut pending.rx).await;
        match waited {
            Ok(Ok(())) => {
                pending.disarm();
                self.state.lock().record_wait(enqueued_at.elapsed());
                Ok(Slot { queue: self })
            }
            // The sender lives in our own state and is only consumed by a send.
            Ok(Err(_)) => Err(QueueError::Aborted),
            Err(_) => {
                self.state.lock().timeouts += 1;
                debug!(timeout_ms = self.config.timeout_ms, "count wait timed out");
                Err(QueueError::WaitTimeout(timeout))
            }
        }
    }
}

/// A held concurrency slot. Dropping it admits the next waiter.
struct Slot<'a> {
    queue: &'a BoundedCountQueue,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.queue.state.lock().release();
    }
}

/// A queued waiter that has not yet taken its slot.
///
/// If dropped while armed, either removes itself from the wait list or, if
/// a slot was already handed over, passes that slot on.
struct Pending<'a> {
    queue: &'a BoundedCountQueue,
    id: u64,
    rx: oneshot::Receiver<()>,
    armed: bool,
}

impl Pending<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.queue.state.lock();
        if let Some(pos) = state.waiters.iter().position(|w| w.id == self.id) {
            state.waiters.remove(pos);
        } else if self.rx.try_recv().is_ok() {
            state.release();
        }
    }
}
