//! FIFO of fetches held back until the coordinator reports ready.

use crate::coordinator::ReadinessCoordinator;
use crate::error::Result;
use crate::observer::ObserverId;
use crate::target::FetchTarget;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

/// Executes one fetch now, with whatever route is available
pub trait Dispatch: Send + Sync {
    /// Dispatch `target`
    fn dispatch(&self, target: &FetchTarget) -> Result<()>;
}

/// What [`DeferredDispatchQueue::submit`] did with a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Dispatched before returning
    Immediate,
    /// Queued until the next ready notification
    Deferred,
}

#[derive(Default)]
struct Pending {
    targets: Vec<FetchTarget>,
    draining: bool,
}

/// Holds fetches submitted before readiness and replays them once, in order
///
/// The queue registers itself as an observer of its coordinator on
/// construction and deregisters on drop. A drain takes the whole pending
/// vector under the lock before executing anything, so submissions made by
/// an executor during the drain land in a fresh vector and run in the next
/// cycle of the same drain.
///
/// Lock order: queue, then coordinator.
pub struct DeferredDispatchQueue {
    coordinator: Arc<ReadinessCoordinator>,
    dispatcher: Arc<dyn Dispatch>,
    pending: Mutex<Pending>,
    observer: ObserverId,
}

impl DeferredDispatchQueue {
    /// Create a queue draining through `dispatcher` when `coordinator` is ready
    pub fn new(coordinator: Arc<ReadinessCoordinator>, dispatcher: Arc<dyn Dispatch>) -> Arc<Self> {
        Arc::new_cyclic(|queue: &Weak<Self>| {
            let queue = queue.clone();
            let observer = coordinator.add_observer(Arc::new(move || {
                if let Some(queue) = queue.upgrade() {
                    queue.drain();
                }
            }));

            Self {
                coordinator,
                dispatcher,
                pending: Mutex::new(Pending::default()),
                observer,
            }
        })
    }

    /// Dispatch `target` now if ready, otherwise queue it and request a start
    ///
    /// A target never overtakes earlier queued targets: while anything is
    /// queued or a drain is running, new targets are queued behind them.
    pub fn submit(&self, target: FetchTarget) -> SubmitOutcome {
        let ready = {
            let mut pending = self.lock();
            let ready = self.coordinator.is_ready();
            if ready && !pending.draining && pending.targets.is_empty() {
                drop(pending);
                self.execute(&target);
                return SubmitOutcome::Immediate;
            }

            debug!("Deferring {} ({} already queued)", target, pending.targets.len());
            pending.targets.push(target);
            ready
        };

        // The start hook may complete synchronously, which drains; so no lock here
        if !ready && !self.coordinator.is_start_pending() {
            self.coordinator.start();
        }
        SubmitOutcome::Deferred
    }

    /// Number of queued targets
    pub fn pending_len(&self) -> usize {
        self.lock().targets.len()
    }

    /// Whether a drain is in progress
    pub fn is_draining(&self) -> bool {
        self.lock().draining
    }

    /// Replay everything queued, then anything queued meanwhile
    ///
    /// Stops early, leaving the rest queued, if the coordinator leaves the
    /// ready state. A nested call made while a drain runs returns at once.
    fn drain(&self) {
        {
            let mut pending = self.lock();
            if pending.draining {
                return;
            }
            pending.draining = true;
        }

        let mut executed = 0usize;
        loop {
            let batch = {
                let mut pending = self.lock();
                if pending.targets.is_empty() || !self.coordinator.is_ready() {
                    pending.draining = false;
                    break;
                }
                std::mem::take(&mut pending.targets)
            };

            debug!("Draining {} deferred fetch(es)", batch.len());
            for target in &batch {
                self.execute(target);
            }
            executed += batch.len();
        }

        if executed > 0 {
            info!("Replayed {} deferred fetch(es)", executed);
        }
    }

    fn execute(&self, target: &FetchTarget) {
        match self.dispatcher.dispatch(target) {
            Ok(()) => debug!("Dispatched {}", target),
            Err(e) => warn!("Dispatch of {} failed: {}", target, e),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DeferredDispatchQueue {
    fn drop(&mut self) {
        self.coordinator.remove_observer(self.observer);
        let left = self.lock().targets.len();
        if left > 0 {
            debug!("Dropping queue with {} undispatched fetch(es)", left);
        }
    }
}

impl std::fmt::Debug for DeferredDispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.lock();
        f.debug_struct("DeferredDispatchQueue")
            .field("pending", &pending.targets.len())
            .field("draining", &pending.draining)
            .field("observer", &self.observer)
            .finish()
    }
}
