//! Backend implementations for different execution contexts
//!
//! Only local execution is provided. Other contexts implement
//! [`Launcher`](crate::Launcher) and [`ProcessHandle`](crate::ProcessHandle).

pub mod local;
pub use local::LocalLauncher;
