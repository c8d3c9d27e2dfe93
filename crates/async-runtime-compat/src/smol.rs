//! Smol runtime spawner implementation

use crate::{BoxedTask, Spawner};

/// Spawner for the Smol global executor
#[derive(Debug, Clone, Copy, Default)]
pub struct SmolSpawner;

impl Spawner for SmolSpawner {
    fn spawn(&self, future: BoxedTask) {
        smol::spawn(future).detach();
    }
}
