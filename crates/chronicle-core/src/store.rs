//! Data store contract and the transfer objects that flow through it.
//!
//! A backend implements [`DataStore`]: `select_by_id` returns the stored
//! history of one aggregate as an [`AggregateReadSet`], and `flush` applies a
//! [`ChangeSet`] of inserts, updates and deletes under optimistic concurrency.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::aggregate::AggregateRoot;
use crate::error::{FlushError, LoadError};
use crate::snapshot::SnapshotOrEvent;

/// Stored history of one aggregate: an optional snapshot plus the events
/// newer than it, in ascending version order.
pub struct AggregateReadSet<A: AggregateRoot> {
    snapshot: Option<A::Snapshot>,
    events: Vec<A::Event>,
}

impl<A: AggregateRoot> AggregateReadSet<A> {
    /// Creates a read set. Events are put in ascending version order.
    #[must_use]
    pub fn new(snapshot: Option<A::Snapshot>, mut events: Vec<A::Event>) -> Self {
        events.sort_by(|a, b| a.version().cmp(b.version()));
        Self { snapshot, events }
    }

    /// A read set with neither snapshot nor events.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            snapshot: None,
            events: Vec::new(),
        }
    }

    /// Returns the snapshot, if any.
    pub fn snapshot(&self) -> Option<&A::Snapshot> {
        self.snapshot.as_ref()
    }

    /// Returns the events in ascending version order.
    pub fn events(&self) -> &[A::Event] {
        &self.events
    }

    /// Returns `true` when there is nothing to restore from.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none() && self.events.is_empty()
    }
}

impl<A: AggregateRoot> Clone for AggregateReadSet<A> {
    fn clone(&self) -> Self {
        Self {
            snapshot: self.snapshot.clone(),
            events: self.events.clone(),
        }
    }
}

impl<A: AggregateRoot> fmt::Debug for AggregateReadSet<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateReadSet")
            .field("snapshot", &self.snapshot)
            .field("events", &self.events)
            .finish()
    }
}

/// New history for one aggregate, submitted to the store on flush.
///
/// `new_version` is the highest of the snapshot's version and the last
/// event's version. `old_version` is the version observed when the aggregate
/// was read; for an insert it equals `new_version`.
pub struct AggregateWriteSet<A: AggregateRoot> {
    id: A::Id,
    old_version: A::Version,
    new_version: A::Version,
    snapshot: Option<A::Snapshot>,
    events: Vec<A::Event>,
}

impl<A: AggregateRoot> AggregateWriteSet<A> {
    /// Builds a write set, sorting `events` by version.
    ///
    /// Returns `None` when there is neither a snapshot nor any event, since
    /// such a write carries no version.
    #[must_use]
    pub fn new(
        id: A::Id,
        old_version: Option<A::Version>,
        snapshot: Option<A::Snapshot>,
        mut events: Vec<A::Event>,
    ) -> Option<Self> {
        events.sort_by(|a, b| a.version().cmp(b.version()));
        let snapshot_version = snapshot.as_ref().map(SnapshotOrEvent::version);
        let last_event_version = events.last().map(SnapshotOrEvent::version);
        let new_version = match (snapshot_version, last_event_version) {
            (Some(snapshot), Some(event)) => snapshot.max(event).clone(),
            (Some(version), None) | (None, Some(version)) => version.clone(),
            (None, None) => return None,
        };
        let old_version = old_version.unwrap_or_else(|| new_version.clone());
        Some(Self {
            id,
            old_version,
            new_version,
            snapshot,
            events,
        })
    }

    /// Returns the aggregate identifier.
    pub fn id(&self) -> &A::Id {
        &self.id
    }

    /// Returns the version the writer observed (the concurrency token).
    pub fn old_version(&self) -> &A::Version {
        &self.old_version
    }

    /// Returns the version the record will have after this write.
    pub fn new_version(&self) -> &A::Version {
        &self.new_version
    }

    /// Returns the snapshot, if one is part of this write.
    pub fn snapshot(&self) -> Option<&A::Snapshot> {
        self.snapshot.as_ref()
    }

    /// Returns the events in ascending version order.
    pub fn events(&self) -> &[A::Event] {
        &self.events
    }

    /// Splits the write set into its snapshot and events.
    #[must_use]
    pub fn into_parts(self) -> (Option<A::Snapshot>, Vec<A::Event>) {
        (self.snapshot, self.events)
    }
}

impl<A: AggregateRoot> Clone for AggregateWriteSet<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            old_version: self.old_version.clone(),
            new_version: self.new_version.clone(),
            snapshot: self.snapshot.clone(),
            events: self.events.clone(),
        }
    }
}

impl<A: AggregateRoot> fmt::Debug for AggregateWriteSet<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateWriteSet")
            .field("id", &self.id)
            .field("old_version", &self.old_version)
            .field("new_version", &self.new_version)
            .field("snapshot", &self.snapshot)
            .field("events", &self.events)
            .finish()
    }
}

/// Partitioned store operations produced by one repository flush.
pub struct ChangeSet<A: AggregateRoot> {
    /// Aggregates that do not exist in the store yet.
    pub aggregates_to_insert: Vec<AggregateWriteSet<A>>,
    /// Existing aggregates with new history.
    pub aggregates_to_update: Vec<AggregateWriteSet<A>>,
    /// Aggregates to remove.
    pub aggregates_to_delete: Vec<A::Id>,
}

impl<A: AggregateRoot> ChangeSet<A> {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            aggregates_to_insert: Vec::new(),
            aggregates_to_update: Vec::new(),
            aggregates_to_delete: Vec::new(),
        }
    }

    /// Returns `true` when there is nothing to apply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aggregates_to_insert.is_empty()
            && self.aggregates_to_update.is_empty()
            && self.aggregates_to_delete.is_empty()
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.aggregates_to_insert.len()
            + self.aggregates_to_update.len()
            + self.aggregates_to_delete.len()
    }
}

impl<A: AggregateRoot> Default for ChangeSet<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: AggregateRoot> Clone for ChangeSet<A> {
    fn clone(&self) -> Self {
        Self {
            aggregates_to_insert: self.aggregates_to_insert.clone(),
            aggregates_to_update: self.aggregates_to_update.clone(),
            aggregates_to_delete: self.aggregates_to_delete.clone(),
        }
    }
}

impl<A: AggregateRoot> fmt::Debug for ChangeSet<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSet")
            .field("aggregates_to_insert", &self.aggregates_to_insert)
            .field("aggregates_to_update", &self.aggregates_to_update)
            .field("aggregates_to_delete", &self.aggregates_to_delete)
            .finish()
    }
}

/// Storage engine contract for one aggregate type.
#[async_trait]
pub trait DataStore<A: AggregateRoot>: Send + Sync {
    /// Loads the stored history for `id`, or `None` if no record exists.
    async fn select_by_id(&self, id: &A::Id) -> Result<Option<AggregateReadSet<A>>, LoadError<A>>;

    /// Applies inserts, then updates, then deletes.
    ///
    /// Each operation is atomic for its own record. The first failure stops
    /// the pass and is returned; operations applied before it stay applied.
    async fn flush(&self, change_set: ChangeSet<A>) -> Result<(), FlushError<A>>;
}

#[async_trait]
impl<A, T> DataStore<A> for Arc<T>
where
    A: AggregateRoot,
    T: DataStore<A> + ?Sized,
{
    async fn select_by_id(&self, id: &A::Id) -> Result<Option<AggregateReadSet<A>>, LoadError<A>> {
        (**self).select_by_id(id).await
    }

    async fn flush(&self, change_set: ChangeSet<A>) -> Result<(), FlushError<A>> {
        (**self).flush(change_set).await
    }
}
