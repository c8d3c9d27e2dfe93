//! Ordered set of readiness callbacks.

use indexmap::IndexMap;
use std::sync::Arc;

/// Callback invoked when the coordinator becomes ready
pub type ReadyCallback = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by registration, used to deregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl std::fmt::Display for ObserverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// Registered callbacks in insertion order
///
/// Insertion order is notification order. Registering the same `Arc` twice
/// yields the id of the first registration.
#[derive(Default)]
pub struct ObserverSet {
    next_id: u64,
    entries: IndexMap<ObserverId, ReadyCallback>,
}

impl ObserverSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`, returning its id
    pub fn insert(&mut self, callback: ReadyCallback) -> ObserverId {
        if let Some((id, _)) = self
            .entries
            .iter()
            .find(|(_, existing)| Arc::ptr_eq(*existing, &callback))
        {
            return *id;
        }

        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, callback);
        id
    }

    /// Deregister `id`; returns whether it was present
    pub fn remove(&mut self, id: ObserverId) -> bool {
        // shift_remove keeps the remaining notification order intact
        self.entries.shift_remove(&id).is_some()
    }

    /// Whether `id` is still registered
    pub fn contains(&self, id: ObserverId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of registered observers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no observer is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the current registrations, for iteration without the lock
    pub fn snapshot(&self) -> Vec<(ObserverId, ReadyCallback)> {
        self.entries
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect()
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
