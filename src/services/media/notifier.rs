use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use tokio::sync::watch;
use tracing::trace;

/// Consumer callback fired on every tracked change
pub type NotifyCallback = Arc<dyn Fn() + Send + Sync>;

/// Single-slot change notification.
///
/// Holds at most one callback. Replacing it drops the previous one and fires
/// the new one right away so the consumer can read the initial state. Each
/// firing also bumps a generation counter that async consumers can await.
pub struct EventNotifier {
    callback: RwLock<Option<NotifyCallback>>,
    generation: watch::Sender<u64>,
}

impl EventNotifier {
    pub(crate) fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            callback: RwLock::new(None),
            generation,
        }
    }

    /// Replace the callback and fire it once
    pub fn set(&self, callback: NotifyCallback) {
        *self
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&callback));
        callback();
    }

    /// Remove the callback
    pub fn clear(&self) {
        *self
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Whether a callback is installed
    pub fn is_set(&self) -> bool {
        self.callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Notify the consumer of a change
    pub fn fire(&self) {
        self.generation.send_modify(|generation| *generation += 1);

        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        trace!(has_callback = callback.is_some(), "Firing change notification");
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Receiver that observes every firing
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

impl fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNotifier")
            .field("is_set", &self.is_set())
            .field("generation", &*self.generation.borrow())
            .finish()
    }
}
