//! Fixtures shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::aggregate::{AggregateCore, AggregateRoot, Snapshotting};
use crate::clock::Clock;
use crate::error::{ConcurrencyConflict, DuplicateKey, FlushError, LoadError};
use crate::event::{DomainEvent, EventBus, EventMetadata};
use crate::snapshot::{NoSnapshot, SnapshotOrEvent};
use crate::store::{AggregateReadSet, ChangeSet, DataStore};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CounterChange {
    Created,
    Incremented { by: i64 },
    Removed,
}

#[derive(Debug, Clone)]
pub(crate) struct CounterEvent {
    pub metadata: EventMetadata<u32, i64>,
    pub change: CounterChange,
}

impl SnapshotOrEvent for CounterEvent {
    type Id = u32;
    type Version = i64;

    fn aggregate_id(&self) -> &u32 {
        &self.metadata.aggregate_id
    }

    fn version(&self) -> &i64 {
        &self.metadata.version
    }
}

impl DomainEvent for CounterEvent {
    fn event_type(&self) -> &'static str {
        match self.change {
            CounterChange::Created => "counter.created",
            CounterChange::Incremented { .. } => "counter.incremented",
            CounterChange::Removed => "counter.removed",
        }
    }

    fn metadata(&self) -> &EventMetadata<u32, i64> {
        &self.metadata
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CounterSnapshot {
    pub id: u32,
    pub version: i64,
    pub total: i64,
}

impl SnapshotOrEvent for CounterSnapshot {
    type Id = u32;
    type Version = i64;

    fn aggregate_id(&self) -> &u32 {
        &self.id
    }

    fn version(&self) -> &i64 {
        &self.version
    }
}

/// Minimal aggregate: a running total.
#[derive(Debug)]
pub(crate) struct Counter {
    core: AggregateCore<CounterEvent>,
    pub total: i64,
}

impl Counter {
    pub fn create(id: u32) -> Self {
        let mut counter = Self {
            core: AggregateCore::new(id),
            total: 0,
        };
        counter.raise_change(CounterChange::Created);
        counter
    }

    pub fn increment(&mut self, by: i64) {
        self.raise_change(CounterChange::Incremented { by });
    }

    fn raise_change(&mut self, change: CounterChange) {
        let event = CounterEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: String::new(),
                aggregate_id: *self.core.id(),
                version: self.core.next_version(),
                correlation_id: Uuid::nil(),
                causation_id: Uuid::nil(),
                occurred_at: Utc::now(),
            },
            change,
        };
        self.raise(event);
    }
}

impl AggregateRoot for Counter {
    type Id = u32;
    type Version = i64;
    type Event = CounterEvent;
    type Snapshot = CounterSnapshot;

    fn core(&self) -> &AggregateCore<CounterEvent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AggregateCore<CounterEvent> {
        &mut self.core
    }

    fn restore(first_event: &CounterEvent) -> Option<Self> {
        if first_event.change != CounterChange::Created {
            return None;
        }
        let mut counter = Self {
            core: AggregateCore::new(first_event.metadata.aggregate_id),
            total: 0,
        };
        counter.replay(first_event);
        Some(counter)
    }

    fn apply(&mut self, event: &CounterEvent) {
        if let CounterChange::Incremented { by } = event.change {
            self.total += by;
        }
    }

    fn on_remove(&mut self, _clock: &dyn Clock) {
        self.raise_change(CounterChange::Removed);
    }
}

impl Snapshotting for Counter {
    fn take_snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            id: *self.core.id(),
            version: *self.core.version(),
            total: self.total,
        }
    }

    fn restore_snapshot(snapshot: &CounterSnapshot) -> Self {
        Self {
            core: AggregateCore::restored(snapshot.id, snapshot.version),
            total: snapshot.total,
        }
    }
}

/// Event-sourced aggregate without snapshot support: counts the changes made
/// to a counter id.
#[derive(Debug)]
pub(crate) struct Journal {
    core: AggregateCore<CounterEvent>,
    pub entries: usize,
}

impl AggregateRoot for Journal {
    type Id = u32;
    type Version = i64;
    type Event = CounterEvent;
    type Snapshot = NoSnapshot<u32, i64>;

    fn core(&self) -> &AggregateCore<CounterEvent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AggregateCore<CounterEvent> {
        &mut self.core
    }

    fn restore(first_event: &CounterEvent) -> Option<Self> {
        if first_event.change != CounterChange::Created {
            return None;
        }
        let mut journal = Self {
            core: AggregateCore::new(first_event.metadata.aggregate_id),
            entries: 0,
        };
        journal.replay(first_event);
        Some(journal)
    }

    fn apply(&mut self, _event: &CounterEvent) {
        self.entries += 1;
    }
}

/// Event bus that remembers the versions it saw.
#[derive(Debug, Default)]
pub(crate) struct RecordingBus {
    versions: Mutex<Vec<i64>>,
}

impl RecordingBus {
    pub fn published(&self) -> Vec<i64> {
        self.versions.lock().unwrap().clone()
    }
}

impl EventBus<CounterEvent> for RecordingBus {
    fn publish(&self, event: &CounterEvent) {
        self.versions.lock().unwrap().push(event.metadata.version);
    }
}

#[derive(Debug, Default)]
struct StoredCounter {
    snapshot: Option<CounterSnapshot>,
    events: Vec<CounterEvent>,
    version: i64,
}

/// Store with the same concurrency rules as a real backend, plus a log of
/// every change set it was handed.
#[derive(Debug, Default)]
pub(crate) struct CounterStore {
    records: Mutex<HashMap<u32, StoredCounter>>,
    flushes: Mutex<Vec<ChangeSet<Counter>>>,
}

impl CounterStore {
    pub fn flushes(&self) -> Vec<ChangeSet<Counter>> {
        self.flushes.lock().unwrap().clone()
    }

    pub fn stored_version(&self, id: u32) -> Option<i64> {
        self.records.lock().unwrap().get(&id).map(|r| r.version)
    }

    pub fn stored_event_count(&self, id: u32) -> usize {
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .map_or(0, |r| r.events.len())
    }

    pub fn has_snapshot(&self, id: u32) -> bool {
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .is_some_and(|r| r.snapshot.is_some())
    }

    /// Simulates another writer bumping the stored version.
    pub fn bump_version(&self, id: u32) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.version += 1;
        }
    }
}

#[async_trait]
impl DataStore<Counter> for CounterStore {
    async fn select_by_id(
        &self,
        id: &u32,
    ) -> Result<Option<AggregateReadSet<Counter>>, LoadError<Counter>> {
        let records = self.records.lock().unwrap();
        Ok(records.get(id).map(|record| {
            let floor = record.snapshot.as_ref().map_or(0, |s| s.version);
            let events = record
                .events
                .iter()
                .filter(|e| e.metadata.version > floor)
                .cloned()
                .collect();
            AggregateReadSet::new(record.snapshot.clone(), events)
        }))
    }

    async fn flush(&self, change_set: ChangeSet<Counter>) -> Result<(), FlushError<Counter>> {
        self.flushes.lock().unwrap().push(change_set.clone());
        let mut records = self.records.lock().unwrap();
        for write in change_set.aggregates_to_insert {
            if records.contains_key(write.id()) {
                return Err(DuplicateKey {
                    aggregate_id: *write.id(),
                }
                .into());
            }
            let id = *write.id();
            let version = *write.new_version();
            let (snapshot, events) = write.into_parts();
            records.insert(
                id,
                StoredCounter {
                    snapshot,
                    events,
                    version,
                },
            );
        }
        for write in change_set.aggregates_to_update {
            let record = records.get_mut(write.id());
            let actual = record.as_ref().map(|r| r.version);
            let Some(record) = record.filter(|r| r.version == *write.old_version()) else {
                return Err(ConcurrencyConflict {
                    aggregate_id: *write.id(),
                    expected: *write.old_version(),
                    actual,
                }
                .into());
            };
            record.version = *write.new_version();
            let (snapshot, events) = write.into_parts();
            if snapshot.is_some() {
                record.snapshot = snapshot;
            }
            record.events.extend(events);
        }
        for id in change_set.aggregates_to_delete {
            records.remove(&id);
        }
        Ok(())
    }
}
