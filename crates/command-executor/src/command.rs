//! Program and argument list for a process to launch

use async_process::Command as AsyncCommand;
use std::ffi::{OsStr, OsString};

/// A program plus its arguments
///
/// Cheap to clone and reusable, unlike `async_process::Command`, which is
/// consumed by spawning. The child inherits the caller's environment and
/// working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    program: OsString,
    args: Vec<OsString>,
}

impl Command {
    /// Command running `program` with no arguments
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
        }
    }

    /// Append an argument
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// The program name or path
    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    /// The arguments, in order
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Render the command line for log messages
    pub fn display(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Fresh `async_process::Command` ready to configure and spawn
    pub fn prepare(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}
