//! Single-assignment completion shared by racing handlers.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

/// Handle that settles a request. Clones share the same slot; only the first
/// `complete` call takes effect.
pub struct Completion<T> {
    slot: Arc<Mutex<Option<oneshot::Sender<T>>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Receiving side of a [`Completion`].
pub struct Outcome<T> {
    rx: oneshot::Receiver<T>,
}

pub fn completion<T>() -> (Completion<T>, Outcome<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Completion {
            slot: Arc::new(Mutex::new(Some(tx))),
        },
        Outcome { rx },
    )
}

impl<T> Completion<T> {
    /// Settles the request with `value`. Returns `false` if it was already
    /// settled, in which case `value` is dropped.
    pub fn complete(&self, value: T) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => {
                // The outcome may already be gone; the request still counts as settled.
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    pub fn is_completed(&self) -> bool {
        match self.slot.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl<T> Outcome<T> {
    /// Waits for the winning value. `None` means every handle was dropped
    /// without completing.
    pub async fn wait(self) -> Option<T> {
        self.rx.await.ok()
    }
}
