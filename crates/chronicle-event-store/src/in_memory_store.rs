//! In-memory implementation of the `DataStore` trait.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::error::{ConcurrencyConflict, DuplicateKey, FlushError, LoadError};
use chronicle_core::snapshot::SnapshotOrEvent;
use chronicle_core::store::{AggregateReadSet, AggregateWriteSet, ChangeSet, DataStore};

/// Everything stored for one aggregate.
struct VersionedRecord<A: AggregateRoot> {
    snapshot: Option<A::Snapshot>,
    events: Vec<A::Event>,
    version: A::Version,
}

impl<A: AggregateRoot> VersionedRecord<A> {
    fn from_write_set(write_set: AggregateWriteSet<A>) -> Self {
        let version = write_set.new_version().clone();
        let (snapshot, events) = write_set.into_parts();
        Self {
            snapshot,
            events,
            version,
        }
    }

    fn read_set(&self) -> AggregateReadSet<A> {
        let events = match &self.snapshot {
            Some(snapshot) => self
                .events
                .iter()
                .filter(|event| event.version() > snapshot.version())
                .cloned()
                .collect(),
            None => self.events.clone(),
        };
        AggregateReadSet::new(self.snapshot.clone(), events)
    }
}

/// Concurrent in-memory data store.
///
/// Each operation locks only the shard holding its own record, so writers to
/// different aggregates never contend. Clones share the same records.
pub struct InMemoryDataStore<A: AggregateRoot> {
    records: Arc<DashMap<A::Id, VersionedRecord<A>>>,
}

impl<A: AggregateRoot> InMemoryDataStore<A> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
        }
    }

    /// Returns the number of stored aggregates.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when no aggregate is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns `true` when a record exists for `id`.
    pub fn contains(&self, id: &A::Id) -> bool {
        self.records.contains_key(id)
    }

    /// Returns the stored version of `id`.
    pub fn stored_version(&self, id: &A::Id) -> Option<A::Version> {
        self.records.get(id).map(|record| record.version.clone())
    }

    /// Returns how many events are stored for `id`, including those folded
    /// into the snapshot.
    pub fn stored_event_count(&self, id: &A::Id) -> usize {
        self.records.get(id).map_or(0, |record| record.events.len())
    }

    /// Returns `true` when a snapshot is stored for `id`.
    pub fn has_snapshot(&self, id: &A::Id) -> bool {
        self.records
            .get(id)
            .is_some_and(|record| record.snapshot.is_some())
    }

    /// Drops every record.
    pub fn clear(&self) {
        self.records.clear();
    }

    fn insert(&self, write_set: AggregateWriteSet<A>) -> Result<(), FlushError<A>> {
        match self.records.entry(write_set.id().clone()) {
            Entry::Occupied(entry) => {
                tracing::warn!(aggregate_id = %entry.key(), "insert rejected: duplicate key");
                Err(DuplicateKey {
                    aggregate_id: entry.key().clone(),
                }
                .into())
            }
            Entry::Vacant(entry) => {
                entry.insert(VersionedRecord::from_write_set(write_set));
                Ok(())
            }
        }
    }

    fn update(&self, write_set: AggregateWriteSet<A>) -> Result<(), FlushError<A>> {
        let Some(mut record) = self.records.get_mut(write_set.id()) else {
            tracing::warn!(aggregate_id = %write_set.id(), "update rejected: record is gone");
            return Err(ConcurrencyConflict {
                aggregate_id: write_set.id().clone(),
                expected: write_set.old_version().clone(),
                actual: None,
            }
            .into());
        };
        if record.version != *write_set.old_version() {
            tracing::warn!(
                aggregate_id = %write_set.id(),
                expected = %write_set.old_version(),
                actual = %record.version,
                "update rejected: version mismatch"
            );
            return Err(ConcurrencyConflict {
                aggregate_id: write_set.id().clone(),
                expected: write_set.old_version().clone(),
                actual: Some(record.version.clone()),
            }
            .into());
        }
        record.version = write_set.new_version().clone();
        let (snapshot, events) = write_set.into_parts();
        if snapshot.is_some() {
            record.snapshot = snapshot;
        }
        record.events.extend(events);
        Ok(())
    }

    fn delete(&self, id: &A::Id) {
        if self.records.remove(id).is_none() {
            tracing::debug!(aggregate_id = %id, "delete of absent record");
        }
    }
}

impl<A: AggregateRoot> Default for InMemoryDataStore<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: AggregateRoot> Clone for InMemoryDataStore<A> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<A: AggregateRoot> fmt::Debug for InMemoryDataStore<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDataStore")
            .field("records", &self.records.len())
            .finish()
    }
}

#[async_trait]
impl<A: AggregateRoot> DataStore<A> for InMemoryDataStore<A> {
    #[tracing::instrument(skip(self))]
    async fn select_by_id(&self, id: &A::Id) -> Result<Option<AggregateReadSet<A>>, LoadError<A>> {
        Ok(self.records.get(id).map(|record| record.read_set()))
    }

    #[tracing::instrument(skip_all, fields(operations = change_set.len()))]
    async fn flush(&self, change_set: ChangeSet<A>) -> Result<(), FlushError<A>> {
        let ChangeSet {
            aggregates_to_insert,
            aggregates_to_update,
            aggregates_to_delete,
        } = change_set;
        for write_set in aggregates_to_insert {
            self.insert(write_set)?;
        }
        for write_set in aggregates_to_update {
            self.update(write_set)?;
        }
        for id in &aggregates_to_delete {
            self.delete(id);
        }
        tracing::debug!("change set applied");
        Ok(())
    }
}
