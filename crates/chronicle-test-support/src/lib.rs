//! Shared test doubles and fixtures for Chronicle.

mod clock;
mod event_bus;
mod store;
pub mod tally;

pub use clock::FixedClock;
pub use event_bus::RecordingEventBus;
pub use store::{EmptyDataStore, FailingDataStore, RecordingDataStore};
