//! Command handlers for the Ledger context.
//!
//! Each handler loads the accounts it needs through the repository, executes
//! the command on them and leaves persistence to the repository: inside a
//! unit of work the changes are written on commit, otherwise immediately.

use std::sync::Arc;

use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::clock::Clock;
use chronicle_core::error::DomainError;
use chronicle_core::repository::Repository;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::aggregates::BankAccount;
use crate::domain::commands::{
    CloseAccount, DepositFunds, OpenAccount, TransferFunds, WithdrawFunds,
};
use crate::domain::events::AccountEvent;
use crate::error::LedgerError;

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct AccountCommandResult {
    /// The aggregate IDs affected by the command.
    pub account_ids: Vec<Uuid>,
    /// The events the command produced, in the order they were raised.
    pub events: Vec<AccountEvent>,
}

/// Events raised on `account` after `version`.
fn events_after(account: &BankAccount, version: i64) -> Vec<AccountEvent> {
    account
        .uncommitted_events()
        .iter()
        .filter(|event| event.metadata.version > version)
        .cloned()
        .collect()
}

/// Handles the `OpenAccount` command: creates the account and registers it
/// with the repository.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a blank owner,
/// `DomainError::InvalidState` if the account is already tracked, or the
/// flush failure when the repository writes immediately.
pub async fn handle_open_account(
    command: &OpenAccount,
    clock: &dyn Clock,
    repo: &Repository<BankAccount>,
) -> Result<AccountCommandResult, LedgerError> {
    let mut account = BankAccount::new(command.account_id);
    if let Some(bus) = repo.event_bus() {
        account = account.with_event_bus(Arc::clone(bus));
    }
    account.open(&command.owner, command.correlation_id, clock)?;
    let events = account.uncommitted_events().to_vec();

    if !repo.add(Arc::new(Mutex::new(account))).await? {
        return Err(DomainError::InvalidState(format!(
            "account {} is already being tracked",
            command.account_id
        ))
        .into());
    }
    tracing::info!(account_id = %command.account_id, "account opened");

    Ok(AccountCommandResult {
        account_ids: vec![command.account_id],
        events,
    })
}

/// Handles the `DepositFunds` command.
///
/// # Errors
///
/// Returns `LoadError::NotFound` if the account does not exist, or the
/// `DomainError` the account raised.
pub async fn handle_deposit_funds(
    command: &DepositFunds,
    clock: &dyn Clock,
    repo: &Repository<BankAccount>,
) -> Result<AccountCommandResult, LedgerError> {
    let handle = repo.get_by_id(&command.account_id).await?;
    let mut account = handle.lock().await;
    let before = *account.version();

    account.deposit(command.amount, command.correlation_id, clock)?;

    Ok(AccountCommandResult {
        account_ids: vec![command.account_id],
        events: events_after(&account, before),
    })
}

/// Handles the `WithdrawFunds` command.
///
/// # Errors
///
/// Returns `LoadError::NotFound` if the account does not exist, or the
/// `DomainError` the account raised.
pub async fn handle_withdraw_funds(
    command: &WithdrawFunds,
    clock: &dyn Clock,
    repo: &Repository<BankAccount>,
) -> Result<AccountCommandResult, LedgerError> {
    let handle = repo.get_by_id(&command.account_id).await?;
    let mut account = handle.lock().await;
    let before = *account.version();

    account.withdraw(command.amount, command.correlation_id, clock)?;

    Ok(AccountCommandResult {
        account_ids: vec![command.account_id],
        events: events_after(&account, before),
    })
}

/// Handles the `TransferFunds` command: debits one account and credits the
/// other. Both changes are written by the same flush.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a transfer to the same account,
/// `LoadError::NotFound` if either account does not exist, or the
/// `DomainError` either account raised.
pub async fn handle_transfer_funds(
    command: &TransferFunds,
    clock: &dyn Clock,
    repo: &Repository<BankAccount>,
) -> Result<AccountCommandResult, LedgerError> {
    if command.from_account_id == command.to_account_id {
        return Err(DomainError::Validation(format!(
            "cannot transfer from account {} to itself",
            command.from_account_id
        ))
        .into());
    }
    let from = repo.get_by_id(&command.from_account_id).await?;
    let to = repo.get_by_id(&command.to_account_id).await?;

    let mut events = {
        let mut source = from.lock().await;
        let before = *source.version();
        source.withdraw(command.amount, command.correlation_id, clock)?;
        events_after(&source, before)
    };
    {
        let mut target = to.lock().await;
        let before = *target.version();
        target.deposit(command.amount, command.correlation_id, clock)?;
        events.extend(events_after(&target, before));
    }
    tracing::info!(
        from = %command.from_account_id,
        to = %command.to_account_id,
        amount = command.amount,
        "transfer recorded"
    );

    Ok(AccountCommandResult {
        account_ids: vec![command.from_account_id, command.to_account_id],
        events,
    })
}

/// Handles the `CloseAccount` command: checks the balance and removes the
/// account, which records an `AccountClosed` event.
///
/// # Errors
///
/// Returns `LoadError::NotFound` if the account does not exist,
/// `DomainError::InvalidState` if it still holds funds, or the flush failure
/// when the repository writes immediately.
pub async fn handle_close_account(
    command: &CloseAccount,
    repo: &Repository<BankAccount>,
) -> Result<AccountCommandResult, LedgerError> {
    let handle = repo.get_by_id(&command.account_id).await?;
    let before = {
        let mut account = handle.lock().await;
        account.prepare_close(command.correlation_id)?;
        *account.version()
    };

    repo.remove(&handle).await?;
    let events = events_after(&*handle.lock().await, before);
    tracing::info!(account_id = %command.account_id, "account closed");

    Ok(AccountCommandResult {
        account_ids: vec![command.account_id],
        events,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chronicle_core::error::{ErrorClass, LoadError};
    use chronicle_core::event::DomainEvent;
    use chronicle_core::store::{AggregateReadSet, DataStore};
    use chronicle_core::strategy::EventOnly;
    use chronicle_test_support::{EmptyDataStore, FailingDataStore, FixedClock, RecordingDataStore};

    use super::*;
    use crate::domain::events::{
        ACCOUNT_CLOSED_EVENT_TYPE, FUNDS_DEPOSITED_EVENT_TYPE, FUNDS_WITHDRAWN_EVENT_TYPE,
    };

    fn repo_over(store: Arc<dyn DataStore<BankAccount>>) -> Repository<BankAccount> {
        Repository::new(store, Arc::new(EventOnly))
    }

    /// History of an account opened for Ada and credited with `balance`.
    fn stored_account(account_id: Uuid, balance: i64) -> AggregateReadSet<BankAccount> {
        let clock = FixedClock::default();
        let mut account = BankAccount::new(account_id);
        account.open("Ada", Uuid::new_v4(), &clock).unwrap();
        if balance > 0 {
            account.deposit(balance, Uuid::new_v4(), &clock).unwrap();
        }
        AggregateReadSet::new(None, account.uncommitted_events().to_vec())
    }

    #[tokio::test]
    async fn test_handle_open_account_inserts_new_account() {
        // Arrange
        let store = Arc::new(RecordingDataStore::<BankAccount>::new(None));
        let repo = repo_over(store.clone());
        let command = OpenAccount {
            correlation_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            owner: "Ada".to_owned(),
        };

        // Act
        let result = handle_open_account(&command, &FixedClock::default(), &repo)
            .await
            .unwrap();

        // Assert
        assert_eq!(result.account_ids, vec![command.account_id]);
        assert_eq!(result.events.len(), 1);
        let flushed = store.flushed();
        assert_eq!(flushed.len(), 1);
        let insert = &flushed[0].aggregates_to_insert[0];
        assert_eq!(*insert.id(), command.account_id);
        assert_eq!(*insert.new_version(), 1);
    }

    #[tokio::test]
    async fn test_handle_deposit_funds_returns_only_new_events() {
        // Arrange
        let account_id = Uuid::new_v4();
        let store = Arc::new(RecordingDataStore::new(Some(stored_account(account_id, 10))));
        let repo = repo_over(store.clone());
        let command = DepositFunds {
            correlation_id: Uuid::new_v4(),
            account_id,
            amount: 5,
        };

        // Act
        let result = handle_deposit_funds(&command, &FixedClock::default(), &repo)
            .await
            .unwrap();
        repo.flush().await.unwrap();

        // Assert
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].event_type(), FUNDS_DEPOSITED_EVENT_TYPE);
        assert_eq!(result.events[0].metadata.version, 3);
        let update = &store.flushed()[0].aggregates_to_update[0];
        assert_eq!(*update.old_version(), 2);
        assert_eq!(*update.new_version(), 3);
    }

    #[tokio::test]
    async fn test_handle_deposit_funds_returns_not_found_for_unknown_account() {
        let repo = repo_over(Arc::new(EmptyDataStore));
        let command = DepositFunds {
            correlation_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            amount: 5,
        };

        let result = handle_deposit_funds(&command, &FixedClock::default(), &repo).await;

        match result.unwrap_err() {
            LedgerError::Load(LoadError::NotFound(id)) => assert_eq!(id, command.account_id),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_withdraw_funds_surfaces_domain_error() {
        let account_id = Uuid::new_v4();
        let repo = repo_over(Arc::new(RecordingDataStore::new(Some(stored_account(
            account_id, 10,
        )))));
        let command = WithdrawFunds {
            correlation_id: Uuid::new_v4(),
            account_id,
            amount: 11,
        };

        let err = handle_withdraw_funds(&command, &FixedClock::default(), &repo)
            .await
            .unwrap_err();

        assert_eq!(err.class(), ErrorClass::Conflict);
        assert!(!repo.requires_flush());
    }

    #[tokio::test]
    async fn test_handle_withdraw_funds_propagates_infrastructure_error() {
        let repo = repo_over(Arc::new(FailingDataStore));
        let command = WithdrawFunds {
            correlation_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            amount: 1,
        };

        let err = handle_withdraw_funds(&command, &FixedClock::default(), &repo)
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Load(LoadError::Infrastructure(_))));
        assert_eq!(err.class(), ErrorClass::Server);
    }

    #[tokio::test]
    async fn test_handle_transfer_funds_rejects_same_account() {
        let account_id = Uuid::new_v4();
        let repo = repo_over(Arc::new(EmptyDataStore));
        let command = TransferFunds {
            correlation_id: Uuid::new_v4(),
            from_account_id: account_id,
            to_account_id: account_id,
            amount: 1,
        };

        let err = handle_transfer_funds(&command, &FixedClock::default(), &repo)
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_handle_close_account_removes_immediately_without_unit_of_work() {
        // Arrange
        let account_id = Uuid::new_v4();
        let store = Arc::new(RecordingDataStore::new(Some(stored_account(account_id, 0))));
        let repo = repo_over(store.clone());
        let command = CloseAccount {
            correlation_id: Uuid::new_v4(),
            account_id,
        };

        // Act
        let result = handle_close_account(&command, &repo).await.unwrap();

        // Assert
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].event_type(), ACCOUNT_CLOSED_EVENT_TYPE);
        assert_eq!(result.events[0].metadata.correlation_id, command.correlation_id);
        assert_eq!(store.flushed()[0].aggregates_to_delete, vec![account_id]);
    }

    #[tokio::test]
    async fn test_handle_close_account_with_balance_is_rejected() {
        let account_id = Uuid::new_v4();
        let store = Arc::new(RecordingDataStore::new(Some(stored_account(account_id, 3))));
        let repo = repo_over(store.clone());
        let command = CloseAccount {
            correlation_id: Uuid::new_v4(),
            account_id,
        };

        let err = handle_close_account(&command, &repo).await.unwrap_err();

        assert!(matches!(err, LedgerError::Domain(DomainError::InvalidState(_))));
        assert!(store.flushed().is_empty());
    }

    #[tokio::test]
    async fn test_withdrawal_events_carry_command_correlation() {
        let account_id = Uuid::new_v4();
        let repo = repo_over(Arc::new(RecordingDataStore::new(Some(stored_account(
            account_id, 10,
        )))));
        let command = WithdrawFunds {
            correlation_id: Uuid::new_v4(),
            account_id,
            amount: 4,
        };

        let result = handle_withdraw_funds(&command, &FixedClock::default(), &repo)
            .await
            .unwrap();

        let event = &result.events[0];
        assert_eq!(event.event_type(), FUNDS_WITHDRAWN_EVENT_TYPE);
        assert_eq!(event.metadata.correlation_id, command.correlation_id);
        assert_eq!(event.metadata.causation_id, command.correlation_id);
    }
}
