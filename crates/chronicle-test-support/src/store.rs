//! Test data stores: mock `DataStore` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::error::{FlushError, LoadError};
use chronicle_core::store::{AggregateReadSet, ChangeSet, DataStore};

/// A data store that records every flushed change set. Returns the configured
/// read set from `select_by_id` on every call and always accepts flushes.
#[derive(Debug)]
pub struct RecordingDataStore<A: AggregateRoot> {
    read_set: Option<AggregateReadSet<A>>,
    flushed: Mutex<Vec<ChangeSet<A>>>,
}

impl<A: AggregateRoot> RecordingDataStore<A> {
    /// Create a new recording store that will return `read_set` from every
    /// `select_by_id` call.
    #[must_use]
    pub fn new(read_set: Option<AggregateReadSet<A>>) -> Self {
        Self {
            read_set,
            flushed: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all change sets that were flushed.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn flushed(&self) -> Vec<ChangeSet<A>> {
        self.flushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl<A: AggregateRoot> DataStore<A> for RecordingDataStore<A> {
    async fn select_by_id(&self, _id: &A::Id) -> Result<Option<AggregateReadSet<A>>, LoadError<A>> {
        Ok(self.read_set.clone())
    }

    async fn flush(&self, change_set: ChangeSet<A>) -> Result<(), FlushError<A>> {
        self.flushed.lock().unwrap().push(change_set);
        Ok(())
    }
}

/// A data store that never finds anything and silently accepts flushes.
/// Useful for testing "aggregate not found" scenarios and creation commands.
#[derive(Debug)]
pub struct EmptyDataStore;

#[async_trait]
impl<A: AggregateRoot> DataStore<A> for EmptyDataStore {
    async fn select_by_id(&self, _id: &A::Id) -> Result<Option<AggregateReadSet<A>>, LoadError<A>> {
        Ok(None)
    }

    async fn flush(&self, _change_set: ChangeSet<A>) -> Result<(), FlushError<A>> {
        Ok(())
    }
}

/// A data store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingDataStore;

#[async_trait]
impl<A: AggregateRoot> DataStore<A> for FailingDataStore {
    async fn select_by_id(&self, _id: &A::Id) -> Result<Option<AggregateReadSet<A>>, LoadError<A>> {
        Err(LoadError::Infrastructure("connection refused".into()))
    }

    async fn flush(&self, _change_set: ChangeSet<A>) -> Result<(), FlushError<A>> {
        Err(FlushError::Infrastructure("connection refused".into()))
    }
}
