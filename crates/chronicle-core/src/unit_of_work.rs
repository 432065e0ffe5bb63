//! Unit of work.
//!
//! A [`UnitOfWork`] is an explicit context passed to the repositories that
//! take part in one business transaction. Repositories enlist themselves as
//! [`ResourceManager`]s the first time they touch an aggregate; `commit`
//! flushes every enlisted resource that has pending changes.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::UnitOfWorkError;

/// A participant in a unit of work.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Stable identity used to enlist the resource at most once.
    fn resource_id(&self) -> Uuid;

    /// Returns `true` when the resource holds changes that need flushing.
    fn requires_flush(&self) -> bool;

    /// Writes pending changes to the backing store.
    async fn flush(&self) -> Result<(), UnitOfWorkError>;
}

type Resources = Mutex<Vec<Arc<dyn ResourceManager>>>;

/// Handle to one unit of work. Clones share the same enlistment list.
#[derive(Clone)]
pub struct UnitOfWork {
    id: Uuid,
    resources: Arc<Resources>,
}

impl UnitOfWork {
    /// Starts a new, empty unit of work.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            resources: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the unit of work identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Enlists `resource`. Returns `false` if a resource with the same id is
    /// already enlisted.
    pub fn enlist(&self, resource: Arc<dyn ResourceManager>) -> bool {
        let mut resources = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        let resource_id = resource.resource_id();
        if resources.iter().any(|r| r.resource_id() == resource_id) {
            return false;
        }
        tracing::debug!(unit_of_work = %self.id, %resource_id, "resource enlisted");
        resources.push(resource);
        true
    }

    /// Returns `true` if a resource with `resource_id` is enlisted.
    pub fn is_enlisted(&self, resource_id: Uuid) -> bool {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|r| r.resource_id() == resource_id)
    }

    /// Returns the number of enlisted resources.
    pub fn enlisted_count(&self) -> usize {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Flushes, in enlistment order, every resource that requires it.
    ///
    /// # Errors
    ///
    /// Returns the first resource failure. Resources flushed before it stay
    /// flushed; later ones are not attempted.
    #[tracing::instrument(skip(self), fields(unit_of_work = %self.id))]
    pub async fn commit(&self) -> Result<(), UnitOfWorkError> {
        let resources: Vec<Arc<dyn ResourceManager>> = self
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut flushed = 0_usize;
        for resource in resources {
            if !resource.requires_flush() {
                continue;
            }
            if let Err(err) = resource.flush().await {
                tracing::warn!(
                    resource_id = %err.resource_id,
                    flushed,
                    error = %err,
                    "unit of work commit failed"
                );
                return Err(err);
            }
            flushed += 1;
        }
        tracing::debug!(flushed, "unit of work committed");
        Ok(())
    }

    pub(crate) fn downgrade(&self) -> WeakUnitOfWork {
        WeakUnitOfWork {
            id: self.id,
            resources: Arc::downgrade(&self.resources),
        }
    }
}

impl Default for UnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("enlisted", &self.enlisted_count())
            .finish()
    }
}

/// Non-owning handle held by enlisted resources, so that a unit of work and
/// its resources do not keep each other alive.
#[derive(Clone, Debug)]
pub(crate) struct WeakUnitOfWork {
    id: Uuid,
    resources: Weak<Resources>,
}

impl WeakUnitOfWork {
    pub(crate) fn upgrade(&self) -> Option<UnitOfWork> {
        self.resources.upgrade().map(|resources| UnitOfWork {
            id: self.id,
            resources,
        })
    }
}
