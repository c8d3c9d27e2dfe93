//! Runtime-agnostic command execution library
//!
//! This crate launches local helper processes (the onion proxy being the main
//! one), streams their output as events and exposes a handle for signalling
//! and reaping them. It does not pick an async runtime; every future here runs
//! on whatever executor the caller drives.

#![warn(missing_docs)]

pub mod backends;
pub mod command;
pub mod error;
pub mod event;
pub mod launcher;
pub mod process;

pub use backends::local::{LocalLauncher, LocalProcessHandle, ProcessEventStream};
pub use command::Command;
pub use error::{Error, Result};
pub use event::{LogFilter, LogSource, NoOpFilter, ProcessEvent, ProcessEventType, TrimFilter};
pub use launcher::Launcher;
pub use process::{ExitStatus, ProcessHandle};
