//! Cooperative cancellation for per-entity mission loops.
//!
//! A cancelled loop finishes its current unit of work, persists progress,
//! and returns — it never aborts mid-call.

use tokio::sync::watch;

/// Receiver side handed to the mission runner.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that can never fire. Used when no handle is wired up.
    /// The receiver keeps reporting the last value after the sender drops.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Whether a stop has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Sender side kept by the caller (e.g. a ctrl-c handler).
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request a cooperative stop.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a connected cancel handle/token pair.
pub fn cancel_channel() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_flips_on_cancel() {
        let (handle, token) = cancel_channel();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn never_token_stays_false() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
    }
}
