//! Chronicle demo: a scripted ledger scenario on the in-memory store.

pub mod error;
pub mod scenario;
pub mod state;
