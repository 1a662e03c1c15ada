//! One-shot initialization signal.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Resolves exactly once. Waiting after resolution returns immediately.
///
/// Clones share the same signal.
#[derive(Debug, Clone)]
pub struct InitSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl InitSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Resolve the signal. Returns false if it was already resolved.
    pub fn notify(&self) -> bool {
        self.tx.send_if_modified(|done| {
            if *done {
                false
            } else {
                *done = true;
                true
            }
        })
    }

    pub fn is_notified(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait for the signal. Also resolves if every clone of the signal is dropped.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            let _ = rx.wait_for(|done| *done).await;
        }
    }
}

impl Default for InitSignal {
    fn default() -> Self {
        Self::new()
    }
}
