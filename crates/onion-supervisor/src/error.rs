//! Failure modes of bringing the onion service up.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Reasons [`OnionService::start`](crate::OnionService::start) can fail
///
/// Each is reported once; the supervisor never retries on its own.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The data or hidden service directory could not be created
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        /// Directory that was being created
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The hidden service directory could not be restricted to its owner
    #[error("failed to set permissions on {}: {source}", path.display())]
    PermissionSetFailed {
        /// Directory whose mode was being changed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The torrc could not be written
    #[error("failed to write tor configuration to {}: {source}", path.display())]
    ConfigWriteFailed {
        /// Target torrc path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The tor binary could not be found or spawned
    #[error("failed to launch tor: {0}")]
    ProcessLaunchFailed(#[from] command_executor::Error),

    /// Tor exited before publishing a hostname
    #[error("tor exited during bootstrap with {0}")]
    ProcessExited(command_executor::ExitStatus),

    /// No hostname appeared within the polling budget
    #[error("timed out after {attempts} attempts ({waited:?}) waiting for the onion hostname")]
    ReadinessTimeout {
        /// Number of reads performed
        attempts: u32,
        /// Total configured wait
        waited: Duration,
    },

    /// `stop` was called while bootstrap was still in progress
    #[error("bootstrap cancelled by stop")]
    BootstrapCancelled,
}

/// Result type for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;
