//! Per-run cancellation signal.
//!
//! The guard side is held by whoever owns the run's caller connection.
//! Dropping it cancels the run, so a disconnected consumer stops the remote
//! job instead of leaving it to hit its deadline.

use tokio::sync::watch;

/// Create a connected guard/signal pair.
pub fn cancel_pair() -> (CancelGuard, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelGuard { tx }, CancelSignal { rx })
}

/// Cancels the run when `cancel` is called or when dropped.
#[derive(Debug)]
pub struct CancelGuard {
    tx: watch::Sender<bool>,
}

impl CancelGuard {
    pub fn cancel(&self) {
        // No receivers left means nothing to cancel.
        let _ = self.tx.send(true);
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Observer side, cloned into every suspend point of a run.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested; pending forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    /// Raw receiver for components that take a `watch` signal directly.
    pub fn receiver(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drop_guard_cancels() {
        let (guard, signal) = cancel_pair();
        assert!(!signal.is_cancelled());
        drop(guard);
        assert!(signal.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_stays_pending() {
        let signal = CancelSignal::never();
        let res = tokio::time::timeout(Duration::from_secs(60), signal.cancelled()).await;
        assert!(res.is_err());
    }
}
