//! `Tally`: a minimal snapshot-capable aggregate for storage tests.

use chrono::{DateTime, Utc};
use chronicle_core::aggregate::{AggregateCore, AggregateRoot, Snapshotting};
use chronicle_core::clock::Clock;
use chronicle_core::event::{DomainEvent, EventMetadata};
use chronicle_core::snapshot::SnapshotOrEvent;
use uuid::Uuid;

/// What happened to a tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyChange {
    /// The tally was created at zero.
    Opened,
    /// `amount` was added.
    Added {
        /// Signed delta.
        amount: i64,
    },
    /// The tally was removed.
    Closed,
}

/// Event raised by a [`Tally`].
#[derive(Debug, Clone)]
pub struct TallyEvent {
    /// Event metadata.
    pub metadata: EventMetadata<Uuid, i64>,
    /// The change.
    pub change: TallyChange,
}

impl SnapshotOrEvent for TallyEvent {
    type Id = Uuid;
    type Version = i64;

    fn aggregate_id(&self) -> &Uuid {
        &self.metadata.aggregate_id
    }

    fn version(&self) -> &i64 {
        &self.metadata.version
    }
}

impl DomainEvent for TallyEvent {
    fn event_type(&self) -> &'static str {
        match self.change {
            TallyChange::Opened => "tally.opened",
            TallyChange::Added { .. } => "tally.added",
            TallyChange::Closed => "tally.closed",
        }
    }

    fn metadata(&self) -> &EventMetadata<Uuid, i64> {
        &self.metadata
    }
}

/// Full state of a [`Tally`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallySnapshot {
    /// Aggregate id.
    pub id: Uuid,
    /// Version of the last event folded in.
    pub version: i64,
    /// Running total.
    pub total: i64,
}

impl SnapshotOrEvent for TallySnapshot {
    type Id = Uuid;
    type Version = i64;

    fn aggregate_id(&self) -> &Uuid {
        &self.id
    }

    fn version(&self) -> &i64 {
        &self.version
    }
}

/// A running total.
#[derive(Debug)]
pub struct Tally {
    core: AggregateCore<TallyEvent>,
    total: i64,
}

impl Tally {
    /// Creates a tally at zero, raising `Opened`.
    #[must_use]
    pub fn open(id: Uuid, clock: &dyn Clock) -> Self {
        let mut tally = Self {
            core: AggregateCore::new(id),
            total: 0,
        };
        tally.raise_change(TallyChange::Opened, clock.now());
        tally
    }

    /// Adds `amount`.
    pub fn add(&mut self, amount: i64, clock: &dyn Clock) {
        self.raise_change(TallyChange::Added { amount }, clock.now());
    }

    /// Returns the running total.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.total
    }

    fn raise_change(&mut self, change: TallyChange, occurred_at: DateTime<Utc>) {
        let event = TallyEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: String::new(),
                aggregate_id: *self.core.id(),
                version: self.core.next_version(),
                correlation_id: Uuid::nil(),
                causation_id: Uuid::nil(),
                occurred_at,
            },
            change,
        };
        self.raise(event);
    }
}

impl AggregateRoot for Tally {
    type Id = Uuid;
    type Version = i64;
    type Event = TallyEvent;
    type Snapshot = TallySnapshot;

    fn core(&self) -> &AggregateCore<TallyEvent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AggregateCore<TallyEvent> {
        &mut self.core
    }

    fn restore(first_event: &TallyEvent) -> Option<Self> {
        if first_event.change != TallyChange::Opened {
            return None;
        }
        let mut tally = Self {
            core: AggregateCore::new(first_event.metadata.aggregate_id),
            total: 0,
        };
        tally.replay(first_event);
        Some(tally)
    }

    fn apply(&mut self, event: &TallyEvent) {
        if let TallyChange::Added { amount } = event.change {
            self.total += amount;
        }
    }

    fn on_remove(&mut self, clock: &dyn Clock) {
        self.raise_change(TallyChange::Closed, clock.now());
    }
}

impl Snapshotting for Tally {
    fn take_snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            id: *self.core.id(),
            version: *self.core.version(),
            total: self.total,
        }
    }

    fn restore_snapshot(snapshot: &TallySnapshot) -> Self {
        Self {
            core: AggregateCore::restored(snapshot.id, snapshot.version),
            total: snapshot.total,
        }
    }
}
