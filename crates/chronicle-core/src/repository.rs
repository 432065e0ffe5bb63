//! Repository façade.
//!
//! A [`Repository`] is an identity map over one data store: every aggregate it
//! hands out is tracked until the next flush, at which point the tracked
//! changes are partitioned into inserts, updates and deletes, serialized by
//! the configured strategy and submitted as one [`ChangeSet`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::aggregate::AggregateRoot;
use crate::clock::{Clock, SystemClock};
use crate::error::{CouldNotRestoreAggregate, FlushError, LoadError, RepositoryError, UnitOfWorkError};
use crate::event::SharedEventBus;
use crate::store::{AggregateReadSet, AggregateWriteSet, ChangeSet, DataStore};
use crate::strategy::{Serialized, SharedStrategy};
use crate::unit_of_work::{ResourceManager, UnitOfWork, WeakUnitOfWork};

/// Shared handle to a tracked aggregate.
///
/// Do not hold the lock across `flush` or `UnitOfWork::commit`; both lock
/// every tracked aggregate.
pub type AggregateRef<A> = Arc<AsyncMutex<A>>;

#[derive(Debug, Clone)]
enum Tracking<V> {
    /// Not in the store yet.
    Added,
    /// Read from the store, or flushed, at `version`.
    Loaded { version: V },
}

struct TrackedAggregate<A: AggregateRoot> {
    aggregate: AggregateRef<A>,
    tracking: Tracking<A::Version>,
    /// Stored events newer than the last stored snapshot.
    events_since_snapshot: u64,
}

enum FlushOutcome<A: AggregateRoot> {
    Deleted(A::Id),
    Written {
        id: A::Id,
        aggregate: AggregateRef<A>,
        new_version: A::Version,
        events_since_snapshot: u64,
    },
}

type Session<A> = Mutex<HashMap<<A as AggregateRoot>::Id, TrackedAggregate<A>>>;

/// Repository for one aggregate type over one data store.
///
/// Clones share the same tracked aggregates.
pub struct Repository<A: AggregateRoot> {
    resource_id: Uuid,
    store: Arc<dyn DataStore<A>>,
    strategy: SharedStrategy<A>,
    event_bus: Option<SharedEventBus<A::Event>>,
    clock: Arc<dyn Clock>,
    unit_of_work: Option<WeakUnitOfWork>,
    session: Arc<Session<A>>,
}

impl<A: AggregateRoot> Repository<A> {
    /// Creates a repository that flushes immediately after `add` and `remove`.
    #[must_use]
    pub fn new(store: Arc<dyn DataStore<A>>, strategy: SharedStrategy<A>) -> Self {
        Self {
            resource_id: Uuid::new_v4(),
            store,
            strategy,
            event_bus: None,
            clock: Arc::new(SystemClock),
            unit_of_work: None,
            session: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wires `event_bus` into every aggregate this repository loads or adds.
    #[must_use]
    pub fn with_event_bus(mut self, event_bus: SharedEventBus<A::Event>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Uses `clock` for removal hooks.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Defers flushing to `unit_of_work`, which the repository enlists in on
    /// first use.
    #[must_use]
    pub fn with_unit_of_work(mut self, unit_of_work: &UnitOfWork) -> Self {
        self.unit_of_work = Some(unit_of_work.downgrade());
        self
    }

    /// Returns the wired event bus, if any.
    pub fn event_bus(&self) -> Option<&SharedEventBus<A::Event>> {
        self.event_bus.as_ref()
    }

    /// Returns the number of tracked aggregates.
    pub fn tracked_count(&self) -> usize {
        self.session().len()
    }

    /// Loads the aggregate `id`.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::NotFound` if no aggregate exists, or the store or
    /// strategy failure.
    pub async fn get_by_id(&self, id: &A::Id) -> Result<AggregateRef<A>, LoadError<A>> {
        self.get_by_id_or_none(id)
            .await?
            .ok_or_else(|| LoadError::NotFound(id.clone()))
    }

    /// Loads the aggregate `id`, returning `None` if it does not exist or was
    /// removed in this session.
    ///
    /// Repeated loads return the same handle until the aggregate is removed.
    ///
    /// # Errors
    ///
    /// Returns the store or strategy failure.
    #[tracing::instrument(skip(self), fields(resource_id = %self.resource_id))]
    pub async fn get_by_id_or_none(
        &self,
        id: &A::Id,
    ) -> Result<Option<AggregateRef<A>>, LoadError<A>> {
        let tracked = self.session().get(id).map(|t| t.aggregate.clone());
        if let Some(aggregate) = tracked {
            if aggregate.lock().await.has_been_removed() {
                return Ok(None);
            }
            return Ok(Some(aggregate));
        }

        let Some(read_set) = self.store.select_by_id(id).await? else {
            tracing::debug!("aggregate not found");
            return Ok(None);
        };
        let events_since_snapshot = count(read_set.events().len());
        let aggregate = self
            .strategy
            .deserialize(id, read_set, self.event_bus.clone())?;
        let version = aggregate.version().clone();
        tracing::debug!(%version, "aggregate loaded");

        let handle = {
            let mut session = self.session();
            session
                .entry(id.clone())
                .or_insert_with(|| TrackedAggregate {
                    aggregate: Arc::new(AsyncMutex::new(aggregate)),
                    tracking: Tracking::Loaded { version },
                    events_since_snapshot,
                })
                .aggregate
                .clone()
        };
        self.enlist();
        Ok(Some(handle))
    }

    /// Starts tracking a new aggregate. Returns `false` if an aggregate with
    /// the same id is already tracked.
    ///
    /// Without a unit of work the aggregate is inserted immediately.
    ///
    /// # Errors
    ///
    /// Returns the flush failure when flushing immediately.
    pub async fn add(&self, aggregate: AggregateRef<A>) -> Result<bool, FlushError<A>> {
        let id = aggregate.lock().await.aggregate_id().clone();
        {
            let mut session = self.session();
            if session.contains_key(&id) {
                tracing::debug!(aggregate_id = %id, "aggregate already tracked");
                return Ok(false);
            }
            session.insert(
                id.clone(),
                TrackedAggregate {
                    aggregate: aggregate.clone(),
                    tracking: Tracking::Added,
                    events_since_snapshot: 0,
                },
            );
        }
        if let Some(bus) = &self.event_bus {
            let mut guard = aggregate.lock().await;
            if !guard.core().has_event_bus() {
                guard.core_mut().set_event_bus(Some(bus.clone()));
            }
        }
        tracing::debug!(aggregate_id = %id, "aggregate added");
        self.flush_unless_enlisted().await?;
        Ok(true)
    }

    /// Removes a tracked aggregate, running its removal hook. Returns `false`
    /// if the handle is not tracked here or was already removed.
    ///
    /// Without a unit of work the aggregate is deleted immediately.
    ///
    /// # Errors
    ///
    /// Returns the flush failure when flushing immediately.
    pub async fn remove(&self, aggregate: &AggregateRef<A>) -> Result<bool, FlushError<A>> {
        let tracked = self
            .session()
            .values()
            .any(|t| Arc::ptr_eq(&t.aggregate, aggregate));
        if !tracked {
            return Ok(false);
        }
        {
            let mut guard = aggregate.lock().await;
            if !guard.remove(self.clock.as_ref()) {
                return Ok(false);
            }
            tracing::debug!(aggregate_id = %guard.aggregate_id(), "aggregate removed");
        }
        self.flush_unless_enlisted().await?;
        Ok(true)
    }

    /// Loads and removes the aggregate `id`. Returns `false` if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns the load failure, or the flush failure when flushing
    /// immediately.
    pub async fn remove_by_id(&self, id: &A::Id) -> Result<bool, RepositoryError<A>> {
        match self.get_by_id_or_none(id).await? {
            Some(aggregate) => Ok(self.remove(&aggregate).await?),
            None => Ok(false),
        }
    }

    /// Returns `true` when any tracked aggregate is new, modified or removed.
    ///
    /// An aggregate that is locked elsewhere is assumed to need a flush.
    pub fn requires_flush(&self) -> bool {
        self.session().values().any(|tracked| {
            if matches!(tracked.tracking, Tracking::Added) {
                return true;
            }
            match tracked.aggregate.try_lock() {
                Ok(aggregate) => aggregate.has_been_removed() || aggregate.has_been_modified(),
                Err(_) => true,
            }
        })
    }

    /// Writes every tracked change to the store as one change set.
    ///
    /// On success the flushed events are committed on their aggregates,
    /// tracked versions advance and removed aggregates stop being tracked.
    /// On failure nothing in the session changes, although the store may
    /// have applied part of the change set (see `DataStore::flush`). Inserts
    /// that landed stay tracked as new, so a retry on this repository fails
    /// with `DuplicateKey`; discard the repository after a failed flush.
    ///
    /// # Errors
    ///
    /// Returns `ReconstructionFailed` if an aggregate has no history to write,
    /// or the store's failure unchanged.
    #[tracing::instrument(skip(self), fields(resource_id = %self.resource_id))]
    pub async fn flush(&self) -> Result<(), FlushError<A>> {
        let entries: Vec<(A::Id, AggregateRef<A>, Tracking<A::Version>, u64)> = self
            .session()
            .iter()
            .map(|(id, t)| {
                (
                    id.clone(),
                    t.aggregate.clone(),
                    t.tracking.clone(),
                    t.events_since_snapshot,
                )
            })
            .collect();

        let mut change_set = ChangeSet::<A>::new();
        let mut outcomes = Vec::new();
        for (id, handle, tracking, stored_since) in entries {
            let aggregate = handle.lock().await;
            if aggregate.has_been_removed() {
                if matches!(tracking, Tracking::Loaded { .. }) {
                    change_set.aggregates_to_delete.push(id.clone());
                }
                outcomes.push(FlushOutcome::Deleted(id));
                continue;
            }
            let old_version = match tracking {
                Tracking::Added => None,
                Tracking::Loaded { .. } if !aggregate.has_been_modified() => continue,
                Tracking::Loaded { version } => Some(version),
            };
            let is_insert = old_version.is_none();
            let since = stored_since + count(aggregate.uncommitted_events().len());
            let Serialized { snapshot, events } = self.strategy.serialize(&aggregate, since);
            let wrote_snapshot = snapshot.is_some();
            let Some(write_set) =
                AggregateWriteSet::<A>::new(id.clone(), old_version, snapshot, events)
            else {
                return Err(FlushError::ReconstructionFailed(CouldNotRestoreAggregate {
                    aggregate_id: id,
                    read_set: AggregateReadSet::empty(),
                }));
            };
            outcomes.push(FlushOutcome::Written {
                id,
                aggregate: handle.clone(),
                new_version: write_set.new_version().clone(),
                events_since_snapshot: if wrote_snapshot { 0 } else { since },
            });
            if is_insert {
                change_set.aggregates_to_insert.push(write_set);
            } else {
                change_set.aggregates_to_update.push(write_set);
            }
        }

        if change_set.is_empty() {
            tracing::debug!("nothing to write");
        } else {
            let operations = change_set.len();
            if let Err(err) = self.store.flush(change_set).await {
                tracing::warn!(error = %err, operations, "flush failed");
                return Err(err);
            }
            tracing::debug!(operations, "flush committed");
        }

        let committed = {
            let mut session = self.session();
            let mut committed = Vec::new();
            for outcome in outcomes {
                match outcome {
                    FlushOutcome::Deleted(id) => {
                        session.remove(&id);
                    }
                    FlushOutcome::Written {
                        id,
                        aggregate,
                        new_version,
                        events_since_snapshot,
                    } => {
                        if let Some(tracked) = session.get_mut(&id) {
                            tracked.tracking = Tracking::Loaded {
                                version: new_version.clone(),
                            };
                            tracked.events_since_snapshot = events_since_snapshot;
                        }
                        committed.push((aggregate, new_version));
                    }
                }
            }
            committed
        };
        for (aggregate, version) in committed {
            aggregate
                .lock()
                .await
                .core_mut()
                .mark_committed_through(&version);
        }
        Ok(())
    }

    fn session(&self) -> std::sync::MutexGuard<'_, HashMap<A::Id, TrackedAggregate<A>>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enlists in the unit of work, if there is a live one.
    fn enlist(&self) -> bool {
        let Some(unit_of_work) = self.unit_of_work.as_ref().and_then(WeakUnitOfWork::upgrade)
        else {
            return false;
        };
        if !unit_of_work.is_enlisted(self.resource_id) {
            unit_of_work.enlist(Arc::new(self.clone()));
        }
        true
    }

    async fn flush_unless_enlisted(&self) -> Result<(), FlushError<A>> {
        if self.enlist() {
            Ok(())
        } else {
            self.flush().await
        }
    }
}

fn count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

impl<A: AggregateRoot> Clone for Repository<A> {
    fn clone(&self) -> Self {
        Self {
            resource_id: self.resource_id,
            store: Arc::clone(&self.store),
            strategy: Arc::clone(&self.strategy),
            event_bus: self.event_bus.clone(),
            clock: Arc::clone(&self.clock),
            unit_of_work: self.unit_of_work.clone(),
            session: Arc::clone(&self.session),
        }
    }
}

impl<A: AggregateRoot> fmt::Debug for Repository<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("resource_id", &self.resource_id)
            .field("strategy", &self.strategy)
            .field("tracked", &self.tracked_count())
            .field("event_bus", &self.event_bus.is_some())
            .field("unit_of_work", &self.unit_of_work.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<A: AggregateRoot> ResourceManager for Repository<A> {
    fn resource_id(&self) -> Uuid {
        self.resource_id
    }

    fn requires_flush(&self) -> bool {
        Repository::requires_flush(self)
    }

    async fn flush(&self) -> Result<(), UnitOfWorkError> {
        Repository::flush(self)
            .await
            .map_err(|err| UnitOfWorkError::new(self.resource_id, err))
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::*;
    use crate::aggregate::Snapshotting;
    use crate::strategy::{EventOnly, Hybrid, SnapshotOnly};
    use crate::testing::{Counter, CounterEvent, CounterSnapshot, CounterStore, RecordingBus};

    fn repository(store: &Arc<CounterStore>, strategy: SharedStrategy<Counter>) -> Repository<Counter> {
        let store: Arc<dyn DataStore<Counter>> = store.clone();
        Repository::new(store, strategy)
    }

    fn counter_ref(counter: Counter) -> AggregateRef<Counter> {
        Arc::new(AsyncMutex::new(counter))
    }

    async fn seed(store: &Arc<CounterStore>, id: u32, increments: usize) {
        let repo = repository(store, Arc::new(EventOnly));
        let mut counter = Counter::create(id);
        for _ in 0..increments {
            counter.increment(1);
        }
        repo.add(counter_ref(counter)).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_without_unit_of_work_inserts_immediately() {
        // Arrange
        let store = Arc::new(CounterStore::default());
        let repo = repository(&store, Arc::new(EventOnly));
        let counter = counter_ref(Counter::create(1));

        // Act
        let added = repo.add(counter.clone()).await.unwrap();

        // Assert
        assert!(added);
        assert_eq!(store.stored_version(1), Some(1));
        assert!(!counter.lock().await.has_been_modified());
        assert!(!repo.requires_flush());
    }

    #[tokio::test]
    async fn test_add_rejects_already_tracked_id() {
        let store = Arc::new(CounterStore::default());
        let repo = repository(&store, Arc::new(EventOnly));
        repo.add(counter_ref(Counter::create(1))).await.unwrap();

        let added = repo.add(counter_ref(Counter::create(1))).await.unwrap();

        assert!(!added);
        assert_eq!(store.flushes().len(), 1);
    }

    #[tokio::test]
    async fn test_get_by_id_returns_the_same_handle() {
        let store = Arc::new(CounterStore::default());
        seed(&store, 3, 2).await;
        let repo = repository(&store, Arc::new(EventOnly));

        let first = repo.get_by_id(&3).await.unwrap();
        let second = repo.get_by_id(&3).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.lock().await.total, 2);
    }

    #[tokio::test]
    async fn test_get_by_id_reports_missing_aggregate() {
        let store = Arc::new(CounterStore::default());
        let repo = repository(&store, Arc::new(EventOnly));

        let err = repo.get_by_id(&42).await.unwrap_err();

        assert!(matches!(err, LoadError::NotFound(42)));
        assert!(repo.get_by_id_or_none(&42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flush_updates_modified_aggregate_once() {
        // Arrange
        let store = Arc::new(CounterStore::default());
        seed(&store, 1, 0).await;
        let repo = repository(&store, Arc::new(EventOnly));
        let counter = repo.get_by_id(&1).await.unwrap();
        counter.lock().await.increment(5);

        // Act
        repo.flush().await.unwrap();
        repo.flush().await.unwrap();

        // Assert
        let flushes = store.flushes();
        assert_eq!(flushes.len(), 2, "seed insert plus one update");
        let update = &flushes[1].aggregates_to_update[0];
        assert_eq!(*update.old_version(), 1);
        assert_eq!(*update.new_version(), 2);
        assert_eq!(store.stored_version(1), Some(2));
        assert!(!counter.lock().await.has_been_modified());
    }

    #[tokio::test]
    async fn test_second_flush_uses_advanced_version() {
        let store = Arc::new(CounterStore::default());
        seed(&store, 1, 0).await;
        let repo = repository(&store, Arc::new(EventOnly));
        let counter = repo.get_by_id(&1).await.unwrap();
        counter.lock().await.increment(1);
        repo.flush().await.unwrap();

        counter.lock().await.increment(1);
        repo.flush().await.unwrap();

        assert_eq!(store.stored_version(1), Some(3));
        assert_eq!(store.stored_event_count(1), 3);
    }

    #[tokio::test]
    async fn test_stale_writer_gets_concurrency_conflict() {
        // Arrange
        let store = Arc::new(CounterStore::default());
        seed(&store, 1, 0).await;
        let repo = repository(&store, Arc::new(EventOnly));
        let counter = repo.get_by_id(&1).await.unwrap();
        counter.lock().await.increment(1);
        store.bump_version(1);

        // Act
        let err = repo.flush().await.unwrap_err();

        // Assert
        match err {
            FlushError::Concurrency(conflict) => {
                assert_eq!(conflict.expected, 1);
                assert_eq!(conflict.actual, Some(2));
            }
            other => panic!("expected concurrency conflict, got {other:?}"),
        }
        assert!(counter.lock().await.has_been_modified());
        assert!(repo.requires_flush());
    }

    #[tokio::test]
    async fn test_hybrid_snapshots_when_threshold_is_reached() {
        // Arrange
        let store = Arc::new(CounterStore::default());
        let strategy = Arc::new(Hybrid::new(NonZeroU64::new(3).unwrap()));
        let repo = repository(&store, strategy.clone());
        let counter = counter_ref(Counter::create(1));
        repo.add(counter.clone()).await.unwrap();
        assert!(!store.has_snapshot(1));

        // Act
        counter.lock().await.increment(1);
        repo.flush().await.unwrap();
        let before_threshold = store.has_snapshot(1);
        counter.lock().await.increment(1);
        repo.flush().await.unwrap();

        // Assert
        assert!(!before_threshold);
        assert!(store.has_snapshot(1));
        let reloaded = repository(&store, strategy).get_by_id(&1).await.unwrap();
        assert_eq!(reloaded.lock().await.total, 2);
        assert_eq!(*reloaded.lock().await.version(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_only_round_trip() {
        let store = Arc::new(CounterStore::default());
        let repo = repository(&store, Arc::new(SnapshotOnly));
        let mut counter = Counter::create(9);
        counter.increment(4);
        repo.add(counter_ref(counter)).await.unwrap();

        let reloaded = repository(&store, Arc::new(SnapshotOnly))
            .get_by_id(&9)
            .await
            .unwrap();

        assert_eq!(store.stored_event_count(9), 0);
        assert_eq!(reloaded.lock().await.total, 4);
    }

    #[tokio::test]
    async fn test_remove_deletes_and_hides_aggregate() {
        // Arrange
        let store = Arc::new(CounterStore::default());
        seed(&store, 5, 1).await;
        let uow = UnitOfWork::new();
        let repo = repository(&store, Arc::new(EventOnly)).with_unit_of_work(&uow);
        let counter = repo.get_by_id(&5).await.unwrap();

        // Act
        let removed = repo.remove(&counter).await.unwrap();
        let removed_again = repo.remove(&counter).await.unwrap();
        let hidden = repo.get_by_id_or_none(&5).await.unwrap().is_none();
        uow.commit().await.unwrap();

        // Assert
        assert!(removed);
        assert!(!removed_again);
        assert!(hidden);
        assert_eq!(store.stored_version(5), None);
        assert_eq!(repo.tracked_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_ignores_untracked_handle() {
        let store = Arc::new(CounterStore::default());
        let repo = repository(&store, Arc::new(EventOnly));

        let removed = repo.remove(&counter_ref(Counter::create(1))).await.unwrap();

        assert!(!removed);
        assert!(store.flushes().is_empty());
    }

    #[tokio::test]
    async fn test_remove_by_id_of_missing_aggregate_is_false() {
        let store = Arc::new(CounterStore::default());
        let repo = repository(&store, Arc::new(EventOnly));

        assert!(!repo.remove_by_id(&8).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_by_id_runs_hook_and_deletes_on_commit() {
        // Arrange
        let store = Arc::new(CounterStore::default());
        seed(&store, 5, 1).await;
        let bus = Arc::new(RecordingBus::default());
        let shared: SharedEventBus<CounterEvent> = bus.clone();
        let uow = UnitOfWork::new();
        let repo = repository(&store, Arc::new(EventOnly))
            .with_event_bus(shared)
            .with_unit_of_work(&uow);

        // Act
        let removed = repo.remove_by_id(&5).await.unwrap();
        let enlisted = uow.is_enlisted(repo.resource_id());
        let stored_before_commit = store.stored_version(5);
        uow.commit().await.unwrap();

        // Assert
        assert!(removed);
        assert_eq!(bus.published(), vec![3]);
        assert!(enlisted);
        assert_eq!(stored_before_commit, Some(2));
        assert_eq!(store.stored_version(5), None);
        assert_eq!(repo.tracked_count(), 0);
    }

    #[tokio::test]
    async fn test_added_then_removed_aggregate_never_reaches_store() {
        let store = Arc::new(CounterStore::default());
        let uow = UnitOfWork::new();
        let repo = repository(&store, Arc::new(EventOnly)).with_unit_of_work(&uow);
        let counter = counter_ref(Counter::create(4));
        repo.add(counter.clone()).await.unwrap();
        repo.remove(&counter).await.unwrap();

        uow.commit().await.unwrap();

        assert!(store.flushes().is_empty());
        assert_eq!(repo.tracked_count(), 0);
    }

    #[tokio::test]
    async fn test_unit_of_work_defers_writes_until_commit() {
        // Arrange
        let store = Arc::new(CounterStore::default());
        let uow = UnitOfWork::new();
        let repo = repository(&store, Arc::new(EventOnly)).with_unit_of_work(&uow);

        // Act
        repo.add(counter_ref(Counter::create(1))).await.unwrap();
        repo.add(counter_ref(Counter::create(2))).await.unwrap();
        let pending = store.stored_version(1);
        uow.commit().await.unwrap();

        // Assert
        assert_eq!(pending, None);
        assert_eq!(uow.enlisted_count(), 1);
        assert_eq!(store.flushes().len(), 1);
        assert_eq!(store.flushes()[0].aggregates_to_insert.len(), 2);
        assert!(!repo.requires_flush());
    }

    #[tokio::test]
    async fn test_event_bus_is_wired_on_load_and_add() {
        // Arrange
        let store = Arc::new(CounterStore::default());
        seed(&store, 1, 0).await;
        let bus = Arc::new(RecordingBus::default());
        let shared: SharedEventBus<CounterEvent> = bus.clone();
        let repo = repository(&store, Arc::new(EventOnly)).with_event_bus(shared);
        let added = counter_ref(Counter::create(2));
        repo.add(added.clone()).await.unwrap();

        // Act
        repo.get_by_id(&1).await.unwrap().lock().await.increment(1);
        added.lock().await.increment(1);

        // Assert
        assert_eq!(bus.published(), vec![2, 2]);
    }

    #[tokio::test]
    async fn test_aggregate_without_history_fails_reconstruction() {
        let store = Arc::new(CounterStore::default());
        let repo = repository(&store, Arc::new(EventOnly));
        let empty = Counter::restore_snapshot(&CounterSnapshot {
            id: 6,
            version: 0,
            total: 0,
        });

        let err = repo.add(counter_ref(empty)).await.unwrap_err();

        assert!(matches!(err, FlushError::ReconstructionFailed(_)));
        assert!(store.flushes().is_empty());
    }
}
