//! Cooperative cancellation of a detection run

use std::sync::Arc;

use tokio::sync::watch;

/// Raises the cancellation signal
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Request cancellation; every paired [`Cancellation`] observes it
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observes the cancellation signal
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    /// Create a linked handle / observer pair
    pub fn new() -> (CancelHandle, Cancellation) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx: Arc::new(tx) }, Cancellation { rx })
    }

    /// An observer that is never cancelled
    pub fn never() -> Cancellation {
        let (_handle, cancellation) = Self::new();
        cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation has been requested
    ///
    /// Pends forever if every handle is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_observer() {
        let (handle, mut cancellation) = Cancellation::new();
        assert!(!cancellation.is_cancelled());

        let waiter = tokio::spawn(async move {
            cancellation.cancelled().await;
            cancellation.is_cancelled()
        });

        handle.cancel();
        assert!(waiter.await.unwrap());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_never_stays_pending() {
        let mut cancellation = Cancellation::never();
        let result =
            tokio::time::timeout(Duration::from_millis(20), cancellation.cancelled()).await;
        assert!(result.is_err());
    }
}
