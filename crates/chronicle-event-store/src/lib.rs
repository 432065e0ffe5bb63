//! Chronicle Event Store: reference storage backend.
//!
//! Provides [`InMemoryDataStore`], a process-local [`DataStore`] with the same
//! optimistic-concurrency contract a database backend must honour.
//!
//! [`DataStore`]: chronicle_core::store::DataStore

pub mod in_memory_store;

pub use in_memory_store::InMemoryDataStore;
