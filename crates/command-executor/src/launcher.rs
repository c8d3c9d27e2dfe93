//! Launcher trait for starting commands

use crate::command::Command;
use crate::error::Result;
use crate::event::ProcessEvent;
use crate::process::ProcessHandle;
use async_trait::async_trait;
use futures::stream::Stream;

/// A launcher that can start commands in a specific context
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// The event stream type this launcher produces
    type EventStream: Stream<Item = ProcessEvent> + Send + Unpin;

    /// The process handle type this launcher produces
    type Handle: ProcessHandle;

    /// Launch a command, returning its event stream and control handle
    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)>;
}
