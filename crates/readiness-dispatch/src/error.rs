//! Per-entry dispatch failures.

use thiserror::Error;

/// Why a single fetch could not be dispatched
///
/// Reported per entry and logged by the queue; never aborts a drain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No running onion service was bound when the fetch executed
    #[error("no onion endpoint available for {target}")]
    Unrouted {
        /// The fetch that had nowhere to go
        target: String,
    },

    /// The executor accepted the route but failed to perform the fetch
    #[error("fetch of {target} failed: {reason}")]
    Execution {
        /// The fetch that failed
        target: String,
        /// Executor-provided description
        reason: String,
    },
}

impl DispatchError {
    /// Create an execution error
    pub fn execution(target: impl ToString, reason: impl Into<String>) -> Self {
        Self::Execution {
            target: target.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;
