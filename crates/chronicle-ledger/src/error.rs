//! Error type of the Ledger context.

use chronicle_core::error::{
    DomainError, ErrorClass, FlushError, LoadError, RepositoryError, UnitOfWorkError,
};
use thiserror::Error;

use crate::domain::aggregates::BankAccount;

/// Everything a ledger command or query can fail with.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A business rule rejected the command.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// An account could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError<BankAccount>),

    /// Immediate persistence of an account failed.
    #[error(transparent)]
    Flush(#[from] FlushError<BankAccount>),

    /// A combined load-and-remove failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError<BankAccount>),

    /// Committing the unit of work failed.
    #[error(transparent)]
    UnitOfWork(#[from] UnitOfWorkError),
}

impl LedgerError {
    /// Returns the boundary classification.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Domain(err) => err.class(),
            Self::Load(err) => err.class(),
            Self::Flush(err) => err.class(),
            Self::Repository(err) => err.class(),
            Self::UnitOfWork(err) => err.class(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chronicle_core::error::ConcurrencyConflict;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_class_follows_wrapped_error() {
        let id = Uuid::new_v4();
        let not_found = LedgerError::from(LoadError::<BankAccount>::NotFound(id));
        let conflict = LedgerError::from(UnitOfWorkError::new(
            Uuid::new_v4(),
            FlushError::<BankAccount>::from(ConcurrencyConflict {
                aggregate_id: id,
                expected: 1,
                actual: Some(2),
            }),
        ));
        let invalid = LedgerError::from(DomainError::Validation("bad amount".into()));

        assert_eq!(not_found.class(), ErrorClass::NotFound);
        assert_eq!(conflict.class(), ErrorClass::Conflict);
        assert_eq!(invalid.class(), ErrorClass::Client);
        assert!(conflict.to_string().contains("expected version 1"));
    }
}
