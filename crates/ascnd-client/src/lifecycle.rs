//! Tracking of in-flight background operations and drain-on-shutdown.
//!
//! Every asynchronous operation is spawned through an [`OperationTracker`],
//! which keeps its join handle in the pending set. Shutdown moves the tracker
//! from Active to Draining, waits for every tracked task, then marks it
//! Closed. Nothing new is spawned once the tracker has left Active.

use std::future::Future;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle of a client's background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Accepting new operations.
    Active,
    /// Waiting for in-flight operations; rejecting new ones.
    Draining,
    /// Every tracked operation has finished.
    Closed,
}

/// Returned when an operation is offered after shutdown began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected(pub LifecycleState);

struct TrackerInner {
    state: LifecycleState,
    pending: Vec<JoinHandle<()>>,
}

/// Owner of the pending operation set.
pub struct OperationTracker {
    inner: Mutex<TrackerInner>,
}

impl Default for OperationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationTracker {
    /// Creates an empty tracker in the Active state.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                state: LifecycleState::Active,
                pending: Vec::new(),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Number of handles currently held, finished or not.
    pub fn tracked(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Spawns `task` on `runtime` and records its handle.
    ///
    /// Finished handles are pruned first. Spawning happens under the tracker
    /// lock, so a concurrent [`drain`](Self::drain) either sees the new
    /// handle or the task is never spawned.
    pub fn spawn<F>(&self, runtime: &Handle, task: F) -> Result<(), Rejected>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Active {
            warn!(state = ?inner.state, "operation rejected, client is shutting down");
            return Err(Rejected(inner.state));
        }
        inner.pending.retain(|handle| !handle.is_finished());
        inner.pending.push(runtime.spawn(task));
        Ok(())
    }

    /// Waits for every tracked operation, then closes the tracker.
    ///
    /// Blocks the calling thread. Calling it again after it returned is a no-op.
    pub fn drain(&self) {
        let handles = {
            let mut inner = self.inner.lock();
            if inner.state == LifecycleState::Closed {
                return;
            }
            inner.state = LifecycleState::Draining;
            std::mem::take(&mut inner.pending)
        };

        let count = handles.len();
        debug!(count, "draining pending operations");
        for handle in handles {
            if let Err(e) = futures::executor::block_on(handle) {
                warn!(error = %e, "pending operation ended abnormally");
            }
        }

        let mut inner = self.inner.lock();
        inner.state = LifecycleState::Closed;
        info!(drained = count, "all pending operations finished");
    }
}

impl std::fmt::Debug for OperationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("OperationTracker")
            .field("state", &inner.state)
            .field("pending", &inner.pending.len())
            .finish()
    }
}
