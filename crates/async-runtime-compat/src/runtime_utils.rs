//! Runtime-agnostic utility functions
//!
//! These helpers hide the cfg-flag selection of the timer implementation so
//! callers do not repeat it.

use crate::cancel::CancelToken;
use futures::future::{self, Either};
use std::time::Duration;

/// Outcome of [`sleep_or_cancel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// The full duration elapsed
    Elapsed,
    /// The token was cancelled before the duration elapsed
    Cancelled,
}

/// Sleep for the specified duration using the current runtime
pub async fn sleep(duration: Duration) {
    #[cfg(feature = "smol")]
    {
        smol::Timer::after(duration).await;
    }

    #[cfg(all(feature = "tokio", not(feature = "smol")))]
    {
        tokio::time::sleep(duration).await;
    }

    #[cfg(not(any(feature = "smol", feature = "tokio")))]
    {
        compile_error!("One of the runtime features must be enabled: smol or tokio");
    }
}

/// Sleep for `duration` unless `token` is cancelled first
///
/// A token that is already cancelled returns immediately without touching the
/// timer.
pub async fn sleep_or_cancel(duration: Duration, token: &CancelToken) -> Wait {
    if token.is_cancelled() {
        return Wait::Cancelled;
    }

    let timer = Box::pin(sleep(duration));
    let cancelled = Box::pin(token.cancelled());

    match future::select(timer, cancelled).await {
        Either::Left(_) => Wait::Elapsed,
        Either::Right(_) => Wait::Cancelled,
    }
}
