//! Readiness state machine with observer fan-out.

use crate::observer::{ObserverId, ObserverSet, ReadyCallback};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Lifecycle of the gated dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    /// Nothing launched yet, or stopped
    NotStarted,
    /// A start has been requested and has not finished
    Starting,
    /// The dependency is usable
    Ready,
    /// The last start failed; behaves like `NotStarted` for the next start
    Failed,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceState::NotStarted => "not-started",
            ServiceState::Starting => "starting",
            ServiceState::Ready => "ready",
            ServiceState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Proof of a specific `Starting` cycle
///
/// Only the ticket of the current cycle can complete or fail it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StartTicket {
    generation: u64,
}

impl StartTicket {
    /// The start cycle this ticket belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Invoked with the fresh ticket whenever a start is requested
pub type StartHook = Arc<dyn Fn(StartTicket) + Send + Sync>;

struct Inner {
    state: ServiceState,
    generation: u64,
    observers: ObserverSet,
    start_hook: Option<StartHook>,
}

/// Tracks whether the dependency is ready and who wants to know
///
/// The coordinator does not launch anything itself. [`start`](Self::start)
/// hands a [`StartTicket`] to the installed [`StartHook`]; whoever does the
/// launching reports back through [`complete`](Self::complete) or
/// [`fail`](Self::fail). Observers and the hook always run with the internal
/// lock released, so they may call back into the coordinator.
pub struct ReadinessCoordinator {
    inner: Mutex<Inner>,
}

impl Default for ReadinessCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessCoordinator {
    /// A coordinator in `NotStarted` with no observers and no hook
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ServiceState::NotStarted,
                generation: 0,
                observers: ObserverSet::new(),
                start_hook: None,
            }),
        }
    }

    /// Install the launcher invoked on every new start cycle
    pub fn set_start_hook(&self, hook: StartHook) {
        self.lock().start_hook = Some(hook);
    }

    /// Remove the start hook
    pub fn clear_start_hook(&self) {
        self.lock().start_hook = None;
    }

    /// Begin a start cycle
    ///
    /// `NotStarted` or `Failed` move to `Starting` and the hook receives the
    /// new ticket. `Starting` and `Ready` are left alone and yield `None`.
    pub fn start(&self) -> Option<StartTicket> {
        let (ticket, hook) = {
            let mut inner = self.lock();
            match inner.state {
                ServiceState::Starting | ServiceState::Ready => {
                    debug!("Start ignored, already {}", inner.state);
                    return None;
                }
                ServiceState::NotStarted | ServiceState::Failed => {}
            }
            inner.generation += 1;
            inner.state = ServiceState::Starting;
            let ticket = StartTicket {
                generation: inner.generation,
            };
            (ticket, inner.start_hook.clone())
        };

        info!("Starting readiness cycle {}", ticket.generation);
        match hook {
            Some(hook) => hook(ticket),
            None => warn!("No start hook installed; waiting for an external complete()"),
        }
        Some(ticket)
    }

    /// Mark the cycle of `ticket` ready and notify observers
    ///
    /// Returns `false` without notifying when the ticket is stale or the
    /// coordinator is not `Starting`.
    pub fn complete(&self, ticket: StartTicket) -> bool {
        let snapshot = {
            let mut inner = self.lock();
            if !Self::is_current(&inner, ticket) {
                debug!(
                    "Ignoring completion of cycle {} (state {}, current cycle {})",
                    ticket.generation, inner.state, inner.generation
                );
                return false;
            }
            inner.state = ServiceState::Ready;
            inner.observers.snapshot()
        };

        info!(
            "Ready after cycle {}, notifying {} observer(s)",
            ticket.generation,
            snapshot.len()
        );
        for (id, callback) in snapshot {
            // An earlier callback may have removed this one
            if !self.lock().observers.contains(id) {
                debug!("Skipping removed {}", id);
                continue;
            }
            callback();
        }
        true
    }

    /// Mark the cycle of `ticket` failed
    pub fn fail(&self, ticket: StartTicket) -> bool {
        let mut inner = self.lock();
        if !Self::is_current(&inner, ticket) {
            debug!("Ignoring failure of stale cycle {}", ticket.generation);
            return false;
        }
        inner.state = ServiceState::Failed;
        warn!("Readiness cycle {} failed", ticket.generation);
        true
    }

    /// Return to `NotStarted` from any state
    ///
    /// Outstanding tickets become stale.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.state != ServiceState::NotStarted {
            info!("Stopping readiness coordinator (was {})", inner.state);
        }
        inner.state = ServiceState::NotStarted;
        inner.generation += 1;
    }

    /// Register a readiness observer
    pub fn add_observer(&self, callback: ReadyCallback) -> ObserverId {
        self.lock().observers.insert(callback)
    }

    /// Deregister an observer; safe from within a notification
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.lock().observers.remove(id)
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    /// Current state
    pub fn state(&self) -> ServiceState {
        self.lock().state
    }

    /// `state() == Ready`
    pub fn is_ready(&self) -> bool {
        self.state() == ServiceState::Ready
    }

    /// `state() == Starting`
    pub fn is_start_pending(&self) -> bool {
        self.state() == ServiceState::Starting
    }

    fn is_current(inner: &Inner, ticket: StartTicket) -> bool {
        inner.state == ServiceState::Starting && inner.generation == ticket.generation
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ReadinessCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ReadinessCoordinator")
            .field("state", &inner.state)
            .field("generation", &inner.generation)
            .field("observers", &inner.observers)
            .finish()
    }
}
