//! Tokio runtime spawner implementation

use crate::{BoxedTask, Spawner};

/// Spawner for the ambient Tokio runtime
///
/// Must be used from within a Tokio runtime context.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl Spawner for TokioSpawner {
    fn spawn(&self, future: BoxedTask) {
        tokio::spawn(future);
    }
}
