//! Local process execution backend

use async_process::{Child, Stdio};
use async_trait::async_trait;
use futures::stream::Stream;
use futures_lite::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::event::{LogFilter, LogSource, NoOpFilter, ProcessEvent, ProcessEventType};
use crate::launcher::Launcher;
use crate::process::{ExitStatus, ProcessHandle};

/// Windows `CREATE_NO_WINDOW` process creation flag
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Launcher for executing processes locally
///
/// Launched processes never get a console window or the caller's stdin; their
/// stdout and stderr are captured into the returned event stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLauncher;

/// A handle to control a local process
///
/// Dropping the handle kills the process.
pub struct LocalProcessHandle {
    child: Child,
}

/// Stream of process events
pub struct ProcessEventStream {
    stdout: Option<Lines<BufReader<async_process::ChildStdout>>>,
    stderr: Option<Lines<BufReader<async_process::ChildStderr>>>,
    filter: Box<dyn LogFilter + Send>,
    started_sent: bool,
    child_id: u32,
}

#[async_trait]
impl Launcher for LocalLauncher {
    type EventStream = ProcessEventStream;
    type Handle = LocalProcessHandle;

    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)> {
        let mut async_cmd = command.prepare();

        async_cmd.stdin(Stdio::null());
        async_cmd.stdout(Stdio::piped());
        async_cmd.stderr(Stdio::piped());

        #[cfg(windows)]
        {
            use async_process::windows::CommandExt;
            async_cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = async_cmd
            .spawn()
            .map_err(|e| Error::from_spawn(command.get_program(), e))?;

        let child_id = child.id();
        debug!("Spawned '{}' with PID {}", command.display(), child_id);

        let stdout = child.stdout.take().map(|s| BufReader::new(s).lines());
        let stderr = child.stderr.take().map(|s| BufReader::new(s).lines());

        let events = ProcessEventStream {
            stdout,
            stderr,
            filter: Box::new(NoOpFilter),
            started_sent: false,
            child_id,
        };

        let handle = LocalProcessHandle { child };

        Ok((events, handle))
    }
}

impl LocalProcessHandle {
    #[cfg(unix)]
    fn send_signal(&self, signal: nix::sys::signal::Signal) -> Result<()> {
        use nix::sys::signal;
        use nix::unistd::Pid;

        let pid = Pid::from_raw(self.child.id() as i32);
        signal::kill(pid, signal).map_err(|e| Error::signal_failed(signal as i32, e.to_string()))
    }
}

#[async_trait]
impl ProcessHandle for LocalProcessHandle {
    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        let status = self.child.try_status()?;
        Ok(status.map(ExitStatus::from))
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        let status = self
            .child
            .status()
            .await
            .map_err(|e| Error::spawn_failed(format!("Failed to wait for process: {}", e)))?;

        Ok(status.into())
    }

    async fn terminate(&mut self) -> Result<()> {
        #[cfg(unix)]
        {
            self.send_signal(nix::sys::signal::Signal::SIGTERM)?;
        }

        #[cfg(not(unix))]
        {
            self.child
                .kill()
                .map_err(|e| Error::signal_failed(-1, e.to_string()))?;
        }

        Ok(())
    }

    async fn kill(&mut self) -> Result<()> {
        #[cfg(unix)]
        {
            self.send_signal(nix::sys::signal::Signal::SIGKILL)?;
        }

        #[cfg(not(unix))]
        {
            self.child
                .kill()
                .map_err(|e| Error::signal_failed(-1, e.to_string()))?;
        }

        Ok(())
    }
}

impl Drop for LocalProcessHandle {
    fn drop(&mut self) {
        // Synchronous kill; the async methods are unavailable here.
        let _ = self.child.kill();
    }
}

impl ProcessEventStream {
    /// Replace the log filter applied to stdout and stderr lines
    pub fn with_filter<F: LogFilter + Send + 'static>(mut self, filter: F) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// Next line from `source` that survives the filter
    fn poll_source(&mut self, source: LogSource, cx: &mut Context<'_>) -> Option<ProcessEvent> {
        loop {
            let line = match source {
                LogSource::Stdout => poll_reader(&mut self.stdout, cx)?,
                LogSource::Stderr => poll_reader(&mut self.stderr, cx)?,
            };
            if let Some(kept) = self.filter.filter(&line, source) {
                let event_type = match source {
                    LogSource::Stdout => ProcessEventType::Stdout,
                    LogSource::Stderr => ProcessEventType::Stderr,
                };
                return Some(ProcessEvent::new_with_data(event_type, kept.to_string()));
            }
        }
    }
}

/// Poll one output pipe for a line
///
/// Returns `None` while the pipe has nothing buffered, and once it reaches
/// EOF or fails, in which case the pipe is dropped.
fn poll_reader<R: AsyncBufRead + Unpin>(
    lines: &mut Option<Lines<R>>,
    cx: &mut Context<'_>,
) -> Option<String> {
    let reader = lines.as_mut()?;
    match Pin::new(reader).poll_next(cx) {
        Poll::Ready(Some(Ok(line))) => Some(line),
        Poll::Ready(Some(Err(_))) | Poll::Ready(None) => {
            *lines = None;
            None
        }
        Poll::Pending => None,
    }
}

impl Stream for ProcessEventStream {
    type Item = ProcessEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Send Started event first
        if !self.started_sent {
            self.started_sent = true;
            let event = ProcessEvent::new(ProcessEventType::Started { pid: self.child_id });
            return Poll::Ready(Some(event));
        }

        if let Some(event) = self.poll_source(LogSource::Stdout, cx) {
            return Poll::Ready(Some(event));
        }
        if let Some(event) = self.poll_source(LogSource::Stderr, cx) {
            return Poll::Ready(Some(event));
        }

        // If both streams are closed, the stream is exhausted
        if self.stdout.is_none() && self.stderr.is_none() {
            return Poll::Ready(None);
        }

        Poll::Pending
    }
}
