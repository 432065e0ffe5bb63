//! Serialization strategies.
//!
//! A strategy decides, on flush, how much of an aggregate's new history is
//! materialized as a snapshot versus kept as discrete events, and, on load,
//! how a read set is turned back into a live aggregate. The policy is chosen
//! once, when a repository is built.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;
use std::sync::Arc;

use crate::aggregate::{AggregateRoot, Snapshotting};
use crate::config::ConfigError;
use crate::error::CouldNotRestoreAggregate;
use crate::event::SharedEventBus;
use crate::snapshot::SnapshotOrEvent;
use crate::store::AggregateReadSet;

/// What a strategy decided to persist for one flush.
pub struct Serialized<A: AggregateRoot> {
    /// Full-state snapshot, if the policy produced one.
    pub snapshot: Option<A::Snapshot>,
    /// Discrete events, in ascending version order.
    pub events: Vec<A::Event>,
}

impl<A: AggregateRoot> fmt::Debug for Serialized<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serialized")
            .field("snapshot", &self.snapshot)
            .field("events", &self.events)
            .finish()
    }
}

/// Policy for turning aggregates into stored history and back.
pub trait SerializationStrategy<A: AggregateRoot>: fmt::Debug + Send + Sync {
    /// Decides what to persist for `aggregate`.
    ///
    /// `events_since_last_snapshot` counts stored events newer than the last
    /// stored snapshot plus the aggregate's uncommitted events. When no
    /// snapshot is produced, every uncommitted event is returned.
    fn serialize(&self, aggregate: &A, events_since_last_snapshot: u64) -> Serialized<A>;

    /// Rebuilds the aggregate `id` from `read_set` and wires `event_bus` into it.
    ///
    /// # Errors
    ///
    /// Returns `CouldNotRestoreAggregate` when the read set holds neither a
    /// usable snapshot nor a creation event.
    fn deserialize(
        &self,
        id: &A::Id,
        read_set: AggregateReadSet<A>,
        event_bus: Option<SharedEventBus<A::Event>>,
    ) -> Result<A, CouldNotRestoreAggregate<A>>;
}

/// Shared handle to a strategy.
pub type SharedStrategy<A> = Arc<dyn SerializationStrategy<A>>;

/// Every flush writes a full snapshot and no events.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotOnly;

/// Flushes never write snapshots; loads replay from the first event.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventOnly;

/// Events on every flush, plus a snapshot once `events_per_snapshot` events
/// have accumulated since the last one.
#[derive(Debug, Clone, Copy)]
pub struct Hybrid {
    events_per_snapshot: NonZeroU64,
}

impl Hybrid {
    /// Creates a hybrid policy with the given threshold.
    #[must_use]
    pub fn new(events_per_snapshot: NonZeroU64) -> Self {
        Self {
            events_per_snapshot,
        }
    }

    /// Returns the snapshot threshold.
    #[must_use]
    pub fn events_per_snapshot(&self) -> NonZeroU64 {
        self.events_per_snapshot
    }
}

impl<A: AggregateRoot> SerializationStrategy<A> for EventOnly {
    fn serialize(&self, aggregate: &A, _events_since_last_snapshot: u64) -> Serialized<A> {
        Serialized {
            snapshot: None,
            events: aggregate.uncommitted_events().to_vec(),
        }
    }

    fn deserialize(
        &self,
        id: &A::Id,
        read_set: AggregateReadSet<A>,
        event_bus: Option<SharedEventBus<A::Event>>,
    ) -> Result<A, CouldNotRestoreAggregate<A>> {
        replay_from_first_event(id, read_set, event_bus)
    }
}

impl<A: Snapshotting> SerializationStrategy<A> for SnapshotOnly {
    fn serialize(&self, aggregate: &A, _events_since_last_snapshot: u64) -> Serialized<A> {
        Serialized {
            snapshot: Some(aggregate.take_snapshot()),
            events: Vec::new(),
        }
    }

    fn deserialize(
        &self,
        id: &A::Id,
        read_set: AggregateReadSet<A>,
        event_bus: Option<SharedEventBus<A::Event>>,
    ) -> Result<A, CouldNotRestoreAggregate<A>> {
        replay_from_snapshot(id, read_set, event_bus)
    }
}

impl<A: Snapshotting> SerializationStrategy<A> for Hybrid {
    fn serialize(&self, aggregate: &A, events_since_last_snapshot: u64) -> Serialized<A> {
        let snapshot = (events_since_last_snapshot >= self.events_per_snapshot.get())
            .then(|| aggregate.take_snapshot());
        Serialized {
            snapshot,
            events: aggregate.uncommitted_events().to_vec(),
        }
    }

    fn deserialize(
        &self,
        id: &A::Id,
        read_set: AggregateReadSet<A>,
        event_bus: Option<SharedEventBus<A::Event>>,
    ) -> Result<A, CouldNotRestoreAggregate<A>> {
        if read_set.snapshot().is_some() {
            replay_from_snapshot(id, read_set, event_bus)
        } else {
            replay_from_first_event(id, read_set, event_bus)
        }
    }
}

fn replay_from_first_event<A: AggregateRoot>(
    id: &A::Id,
    read_set: AggregateReadSet<A>,
    event_bus: Option<SharedEventBus<A::Event>>,
) -> Result<A, CouldNotRestoreAggregate<A>> {
    let Some(mut aggregate) = read_set.events().first().and_then(A::restore) else {
        return Err(CouldNotRestoreAggregate {
            aggregate_id: id.clone(),
            read_set,
        });
    };
    aggregate.core_mut().set_event_bus(event_bus);
    for event in &read_set.events()[1..] {
        aggregate.replay(event);
    }
    Ok(aggregate)
}

fn replay_from_snapshot<A: Snapshotting>(
    id: &A::Id,
    read_set: AggregateReadSet<A>,
    event_bus: Option<SharedEventBus<A::Event>>,
) -> Result<A, CouldNotRestoreAggregate<A>> {
    let Some(snapshot) = read_set.snapshot() else {
        return Err(CouldNotRestoreAggregate {
            aggregate_id: id.clone(),
            read_set,
        });
    };
    let mut aggregate = A::restore_snapshot(snapshot);
    aggregate.core_mut().set_event_bus(event_bus);
    for event in read_set
        .events()
        .iter()
        .filter(|event| event.version() > snapshot.version())
    {
        aggregate.replay(event);
    }
    Ok(aggregate)
}

/// Closed set of policies, as selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// See [`SnapshotOnly`].
    SnapshotOnly,
    /// See [`EventOnly`].
    EventOnly,
    /// See [`Hybrid`].
    Hybrid(NonZeroU64),
}

impl StrategyKind {
    /// Builds the policy for a snapshot-capable aggregate.
    #[must_use]
    pub fn build<A: Snapshotting>(self) -> SharedStrategy<A> {
        match self {
            Self::SnapshotOnly => Arc::new(SnapshotOnly),
            Self::EventOnly => Arc::new(EventOnly),
            Self::Hybrid(events_per_snapshot) => Arc::new(Hybrid::new(events_per_snapshot)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SnapshotOnly => f.write_str("snapshot-only"),
            Self::EventOnly => f.write_str("event-only"),
            Self::Hybrid(n) => write!(f, "hybrid:{n}"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    /// Parses `snapshot-only`, `event-only` or `hybrid:N`. A bare `hybrid`
    /// uses the default threshold.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "snapshot-only" => Ok(Self::SnapshotOnly),
            "event-only" => Ok(Self::EventOnly),
            "hybrid" => Ok(Self::Hybrid(crate::config::default_events_per_snapshot())),
            other => match other.strip_prefix("hybrid:") {
                Some(threshold) => crate::config::parse_threshold("hybrid", threshold).map(Self::Hybrid),
                None => Err(ConfigError::UnknownStrategy(s.to_owned())),
            },
        }
    }
}
