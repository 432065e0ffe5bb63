//! Versioned units of aggregate history.

use std::convert::Infallible;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::marker::PhantomData;

/// Identifier of an aggregate.
pub trait AggregateId: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static {}

impl<T> AggregateId for T where T: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static {}

/// Totally ordered version of an aggregate.
pub trait AggregateVersion: Clone + Ord + Debug + Display + Send + Sync + 'static {
    /// The version of an aggregate that has no history yet.
    fn initial() -> Self;

    /// The version that immediately follows `self`.
    #[must_use]
    fn next(&self) -> Self;
}

macro_rules! integer_version {
    ($($ty:ty),* $(,)?) => {
        $(
            impl AggregateVersion for $ty {
                fn initial() -> Self {
                    0
                }

                fn next(&self) -> Self {
                    self + 1
                }
            }
        )*
    };
}

integer_version!(i64, u64, u32);

/// A full-state snapshot or a single domain event, addressed by
/// `(aggregate_id, version)`.
///
/// A snapshot's version equals the version of the last event folded into it.
pub trait SnapshotOrEvent: Clone + Debug + Send + Sync + 'static {
    /// Identifier type of the owning aggregate.
    type Id: AggregateId;
    /// Version type of the owning aggregate.
    type Version: AggregateVersion;

    /// Returns the identifier of the aggregate this unit belongs to.
    fn aggregate_id(&self) -> &Self::Id;

    /// Returns the version this unit brings the aggregate to.
    fn version(&self) -> &Self::Version;
}

/// Snapshot type for aggregates that never materialize snapshots.
///
/// It cannot be constructed, so a store for such an aggregate never holds one.
#[derive(Debug, Clone)]
pub struct NoSnapshot<K, V> {
    never: Infallible,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: AggregateId, V: AggregateVersion> SnapshotOrEvent for NoSnapshot<K, V> {
    type Id = K;
    type Version = V;

    fn aggregate_id(&self) -> &Self::Id {
        match self.never {}
    }

    fn version(&self) -> &Self::Version {
        match self.never {}
    }
}
