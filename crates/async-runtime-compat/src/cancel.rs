//! One-shot cancellation signal shared between a waiter and a controller

use async_channel::{Receiver, Sender};

/// Controller side of a cancellation pair
///
/// Cancelling closes the underlying channel, which wakes every waiter at once.
/// Dropping the handle has the same effect.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Sender<()>,
}

/// Waiter side of a cancellation pair
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

/// Create a linked handle/token pair
pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (tx, rx) = async_channel::bounded(1);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.close();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }
}

impl CancelToken {
    /// Whether the paired handle has cancelled (or been dropped)
    pub fn is_cancelled(&self) -> bool {
        self.rx.is_closed()
    }

    /// Resolve once cancellation is signalled
    pub async fn cancelled(&self) {
        // Nothing is ever sent; recv only returns once the channel closes.
        while self.rx.recv().await.is_ok() {}
    }
}
