//! Aggregate root abstraction.
//!
//! An aggregate embeds an [`AggregateCore`] that carries the bookkeeping every
//! aggregate shares (identity, version, unflushed events, removal flag, event
//! bus) and implements [`AggregateRoot`] for its own state transitions.
//! Aggregates that can materialize their full state additionally implement
//! [`Snapshotting`].

use std::fmt;

use crate::clock::Clock;
use crate::event::{DomainEvent, SharedEventBus};
use crate::snapshot::{AggregateId, AggregateVersion, SnapshotOrEvent};

/// Bookkeeping shared by every aggregate root.
pub struct AggregateCore<E: DomainEvent> {
    id: E::Id,
    version: E::Version,
    uncommitted_events: Vec<E>,
    removed: bool,
    event_bus: Option<SharedEventBus<E>>,
}

impl<E: DomainEvent> AggregateCore<E> {
    /// Creates the core of a brand-new aggregate at the initial version.
    #[must_use]
    pub fn new(id: E::Id) -> Self {
        Self::restored(id, E::Version::initial())
    }

    /// Creates the core of an aggregate restored at `version`.
    #[must_use]
    pub fn restored(id: E::Id, version: E::Version) -> Self {
        Self {
            id,
            version,
            uncommitted_events: Vec::new(),
            removed: false,
            event_bus: None,
        }
    }

    /// Wires an event bus that receives every event raised from now on.
    #[must_use]
    pub fn with_event_bus(mut self, event_bus: SharedEventBus<E>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Returns the aggregate identifier.
    pub fn id(&self) -> &E::Id {
        &self.id
    }

    /// Returns the current version.
    pub fn version(&self) -> &E::Version {
        &self.version
    }

    /// Returns the version the next raised event must carry.
    #[must_use]
    pub fn next_version(&self) -> E::Version {
        self.version.next()
    }

    /// Returns events raised since the aggregate was loaded or last flushed.
    pub fn uncommitted_events(&self) -> &[E] {
        &self.uncommitted_events
    }

    /// Returns `true` once the aggregate has been removed.
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Returns `true` when an event bus is wired.
    pub fn has_event_bus(&self) -> bool {
        self.event_bus.is_some()
    }

    /// Replaces the wired event bus.
    pub fn set_event_bus(&mut self, event_bus: Option<SharedEventBus<E>>) {
        self.event_bus = event_bus;
    }

    /// Drops uncommitted events up to and including `version`, returning how
    /// many were dropped. Events raised after a flush was prepared survive.
    pub fn mark_committed_through(&mut self, version: &E::Version) -> usize {
        let before = self.uncommitted_events.len();
        self.uncommitted_events
            .retain(|event| event.version() > version);
        before - self.uncommitted_events.len()
    }

    pub(crate) fn record(&mut self, event: E) {
        debug_assert!(
            event.version() > &self.version,
            "event versions must increase strictly"
        );
        self.version = event.version().clone();
        if let Some(bus) = &self.event_bus {
            bus.publish(&event);
        }
        self.uncommitted_events.push(event);
    }

    pub(crate) fn advance_to(&mut self, version: E::Version) {
        self.version = version;
    }

    pub(crate) fn mark_removed(&mut self) {
        self.removed = true;
    }
}

impl<E: DomainEvent> fmt::Debug for AggregateCore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateCore")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("uncommitted_events", &self.uncommitted_events.len())
            .field("removed", &self.removed)
            .field("event_bus", &self.event_bus.is_some())
            .finish()
    }
}

/// Trait for aggregate roots that are reconstructed from stored history.
pub trait AggregateRoot: fmt::Debug + Send + Sync + Sized + 'static {
    /// Identifier type.
    type Id: AggregateId;
    /// Version type.
    type Version: AggregateVersion;
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent<Id = Self::Id, Version = Self::Version>;
    /// The snapshot type; `NoSnapshot` for aggregates that never snapshot.
    type Snapshot: SnapshotOrEvent<Id = Self::Id, Version = Self::Version>;

    /// Returns the embedded bookkeeping.
    fn core(&self) -> &AggregateCore<Self::Event>;

    /// Returns the embedded bookkeeping mutably.
    fn core_mut(&mut self) -> &mut AggregateCore<Self::Event>;

    /// Rebuilds an aggregate from the event that created it, with that event
    /// already applied. Returns `None` if `first_event` is not a creation event.
    fn restore(first_event: &Self::Event) -> Option<Self>;

    /// Apply an event to mutate internal state.
    fn apply(&mut self, event: &Self::Event);

    /// Hook invoked once before the aggregate is marked removed. May raise a
    /// final event.
    fn on_remove(&mut self, _clock: &dyn Clock) {}

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> &Self::Id {
        self.core().id()
    }

    /// Returns the current version.
    fn version(&self) -> &Self::Version {
        self.core().version()
    }

    /// Returns `true` while there are raised events that have not been flushed.
    fn has_been_modified(&self) -> bool {
        !self.core().uncommitted_events().is_empty()
    }

    /// Returns `true` once the aggregate has been removed.
    fn has_been_removed(&self) -> bool {
        self.core().is_removed()
    }

    /// Returns events raised since load or the last flush.
    fn uncommitted_events(&self) -> &[Self::Event] {
        self.core().uncommitted_events()
    }

    /// Applies a freshly produced event, records it for the next flush and
    /// publishes it to the wired event bus.
    fn raise(&mut self, event: Self::Event) {
        self.apply(&event);
        self.core_mut().record(event);
    }

    /// Applies a stored event during reconstruction. Nothing is recorded or
    /// published.
    fn replay(&mut self, event: &Self::Event) {
        self.apply(event);
        self.core_mut().advance_to(event.version().clone());
    }

    /// Runs the removal hook and marks the aggregate removed. Returns `false`
    /// if it was already removed.
    fn remove(&mut self, clock: &dyn Clock) -> bool {
        if self.has_been_removed() {
            return false;
        }
        self.on_remove(clock);
        self.core_mut().mark_removed();
        true
    }
}

/// Capability of aggregates that can capture and restore their full state.
pub trait Snapshotting: AggregateRoot {
    /// Captures the full state at the current version.
    fn take_snapshot(&self) -> Self::Snapshot;

    /// Rebuilds an aggregate at the snapshot's version.
    fn restore_snapshot(snapshot: &Self::Snapshot) -> Self;
}
