//! Runtime-agnostic async utilities
//!
//! This crate lets the supervision code spawn background work and wait on
//! timers without coupling to a specific executor. The bootstrap poll loop
//! is the main consumer: it runs on whatever runtime the host brings and
//! must be interruptible when the service is stopped.
//!
//! # Examples
//!
//! ```no_run
//! use async_runtime_compat::prelude::*;
//! use std::time::Duration;
//!
//! # #[cfg(feature = "smol")]
//! smol::block_on(async {
//!     let (handle, token) = cancellation();
//!     SmolSpawner.spawn(Box::pin(async move {
//!         sleep(Duration::from_millis(10)).await;
//!         handle.cancel();
//!     }));
//!     let wait = sleep_or_cancel(Duration::from_secs(60), &token).await;
//!     assert_eq!(wait, Wait::Cancelled);
//! });
//! ```

#![warn(missing_docs)]

use std::future::Future;
use std::pin::Pin;

/// A boxed future that can be handed to any [`Spawner`]
pub type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A spawner that can spawn futures on an async runtime
pub trait Spawner: Send + Sync {
    /// Spawn a future on the runtime
    ///
    /// The future runs to completion in the background.
    fn spawn(&self, future: BoxedTask);
}

#[cfg(feature = "tokio")]
pub mod tokio;

#[cfg(feature = "smol")]
pub mod smol;

pub mod cancel;
pub mod runtime_utils;

/// Prelude for common imports
pub mod prelude {
    pub use crate::cancel::{cancellation, CancelHandle, CancelToken};
    pub use crate::runtime_utils::{sleep, sleep_or_cancel, Wait};
    pub use crate::{BoxedTask, Spawner};

    #[cfg(feature = "tokio")]
    pub use crate::tokio::TokioSpawner;

    #[cfg(feature = "smol")]
    pub use crate::smol::SmolSpawner;
}

/// Spawner for the runtime selected at compile time
///
/// Smol wins when both runtime features are enabled.
pub fn default_spawner() -> Box<dyn Spawner> {
    #[cfg(feature = "smol")]
    {
        Box::new(smol::SmolSpawner)
    }

    #[cfg(all(feature = "tokio", not(feature = "smol")))]
    {
        Box::new(tokio::TokioSpawner)
    }

    #[cfg(not(any(feature = "smol", feature = "tokio")))]
    {
        compile_error!("One of the runtime features must be enabled: smol or tokio")
    }
}
