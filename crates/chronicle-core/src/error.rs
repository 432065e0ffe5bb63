//! Error types.
//!
//! Every persistence operation returns its own error type. Each error reports
//! an [`ErrorClass`], which is how callers at the boundary map it to a
//! client-visible response.

use std::fmt::Display;

use thiserror::Error;
use uuid::Uuid;

use crate::aggregate::AggregateRoot;
use crate::store::AggregateReadSet;

/// Boundary classification of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The requested aggregate does not exist.
    NotFound,
    /// The caller sent something that can never succeed as-is.
    Client,
    /// The caller raced another writer; reload and retry.
    Conflict,
    /// Data corruption, misconfiguration or backend failure.
    Server,
}

/// Domain rule violations raised by aggregates.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// The command is not allowed in the aggregate's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl DomainError {
    /// Returns the boundary classification.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Client,
            Self::InvalidState(_) => ErrorClass::Conflict,
        }
    }
}

/// The store rejected a write because the expected prior version did not
/// match the stored version.
#[derive(Debug, Error)]
#[error("{}", conflict_message(.aggregate_id, .expected, .actual.as_ref()))]
pub struct ConcurrencyConflict<A: AggregateRoot> {
    /// The aggregate that had the conflict.
    pub aggregate_id: A::Id,
    /// The version the writer last observed.
    pub expected: A::Version,
    /// The version found in the store; `None` if the record is gone.
    pub actual: Option<A::Version>,
}

fn conflict_message<K: Display, V: Display>(
    aggregate_id: &K,
    expected: &V,
    actual: Option<&V>,
) -> String {
    match actual {
        Some(actual) => format!(
            "concurrency conflict on aggregate {aggregate_id}: expected version {expected}, \
             found {actual} (reload and retry)"
        ),
        None => format!(
            "concurrency conflict on aggregate {aggregate_id}: expected version {expected}, \
             but the record no longer exists"
        ),
    }
}

/// An insert targeted an id that already exists.
#[derive(Debug, Error)]
#[error("duplicate key: aggregate {aggregate_id} already exists")]
pub struct DuplicateKey<A: AggregateRoot> {
    /// The offending identifier.
    pub aggregate_id: A::Id,
}

/// Neither a usable snapshot nor a creation event was available to rebuild an
/// aggregate.
#[derive(Debug, Error)]
#[error(
    "could not restore aggregate {aggregate_id} (snapshot present: {}, events: {})",
    .read_set.snapshot().is_some(),
    .read_set.events().len()
)]
pub struct CouldNotRestoreAggregate<A: AggregateRoot> {
    /// The aggregate that could not be restored.
    pub aggregate_id: A::Id,
    /// The raw history that was handed to the strategy.
    pub read_set: AggregateReadSet<A>,
}

/// Errors from loading an aggregate.
#[derive(Debug, Error)]
pub enum LoadError<A: AggregateRoot> {
    /// No record exists for the identifier.
    #[error("aggregate not found: {0}")]
    NotFound(A::Id),

    /// The stored history could not be turned back into an aggregate.
    #[error("{0}")]
    CouldNotRestore(CouldNotRestoreAggregate<A>),

    /// The backing store failed.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl<A: AggregateRoot> LoadError<A> {
    /// Returns the boundary classification.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::CouldNotRestore(_) | Self::Infrastructure(_) => ErrorClass::Server,
        }
    }
}

impl<A: AggregateRoot> From<CouldNotRestoreAggregate<A>> for LoadError<A> {
    fn from(err: CouldNotRestoreAggregate<A>) -> Self {
        Self::CouldNotRestore(err)
    }
}

/// Errors from flushing tracked changes to a store.
#[derive(Debug, Error)]
pub enum FlushError<A: AggregateRoot> {
    /// Optimistic concurrency check failed.
    #[error("{0}")]
    Concurrency(ConcurrencyConflict<A>),

    /// An insert hit an existing record.
    #[error("{0}")]
    DuplicateKey(DuplicateKey<A>),

    /// The write would leave history that can never be restored.
    #[error("{0}")]
    ReconstructionFailed(CouldNotRestoreAggregate<A>),

    /// The backing store failed.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl<A: AggregateRoot> FlushError<A> {
    /// Returns the boundary classification.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Concurrency(_) => ErrorClass::Conflict,
            Self::DuplicateKey(_) => ErrorClass::Client,
            Self::ReconstructionFailed(_) | Self::Infrastructure(_) => ErrorClass::Server,
        }
    }
}

impl<A: AggregateRoot> From<ConcurrencyConflict<A>> for FlushError<A> {
    fn from(err: ConcurrencyConflict<A>) -> Self {
        Self::Concurrency(err)
    }
}

impl<A: AggregateRoot> From<DuplicateKey<A>> for FlushError<A> {
    fn from(err: DuplicateKey<A>) -> Self {
        Self::DuplicateKey(err)
    }
}

/// Errors from repository operations that both load and flush.
#[derive(Debug, Error)]
pub enum RepositoryError<A: AggregateRoot> {
    /// Loading failed.
    #[error("{0}")]
    Load(LoadError<A>),

    /// Flushing failed.
    #[error("{0}")]
    Flush(FlushError<A>),
}

impl<A: AggregateRoot> RepositoryError<A> {
    /// Returns the boundary classification.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Load(err) => err.class(),
            Self::Flush(err) => err.class(),
        }
    }
}

impl<A: AggregateRoot> From<LoadError<A>> for RepositoryError<A> {
    fn from(err: LoadError<A>) -> Self {
        Self::Load(err)
    }
}

impl<A: AggregateRoot> From<FlushError<A>> for RepositoryError<A> {
    fn from(err: FlushError<A>) -> Self {
        Self::Flush(err)
    }
}

/// A resource enlisted in a unit of work failed to flush.
#[derive(Debug, Error)]
#[error("flush of resource {resource_id} failed: {source}")]
pub struct UnitOfWorkError {
    /// The resource that failed.
    pub resource_id: Uuid,
    /// Classification of the underlying failure.
    pub class: ErrorClass,
    /// The underlying failure.
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl UnitOfWorkError {
    /// Wraps a failed flush of `resource_id`.
    pub fn new<A: AggregateRoot>(resource_id: Uuid, err: FlushError<A>) -> Self {
        Self {
            resource_id,
            class: err.class(),
            source: Box::new(err),
        }
    }

    /// Returns the boundary classification.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        self.class
    }
}
