//! Test event bus: remembers everything published to it.

use std::sync::Mutex;

use chronicle_core::event::EventBus;

/// An event bus that records every published event in order.
#[derive(Debug)]
pub struct RecordingEventBus<E> {
    published: Mutex<Vec<E>>,
}

impl<E: Clone> RecordingEventBus<E> {
    /// Creates an empty recording bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all published events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<E> {
        self.published.lock().unwrap().clone()
    }
}

impl<E: Clone> Default for RecordingEventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send> EventBus<E> for RecordingEventBus<E> {
    fn publish(&self, event: &E) {
        self.published.lock().unwrap().push(event.clone());
    }
}
