//! Ledger service: runs every command inside its own unit of work.

use std::sync::Arc;

use chronicle_core::clock::Clock;
use chronicle_core::config::PersistenceConfig;
use chronicle_core::event::SharedEventBus;
use chronicle_core::repository::Repository;
use chronicle_core::store::DataStore;
use chronicle_core::strategy::SharedStrategy;
use chronicle_core::unit_of_work::UnitOfWork;
use uuid::Uuid;

use crate::application::command_handlers::{self, AccountCommandResult};
use crate::application::query_handlers::{self, AccountView};
use crate::domain::aggregates::BankAccount;
use crate::domain::commands::{
    CloseAccount, DepositFunds, OpenAccount, TransferFunds, WithdrawFunds,
};
use crate::domain::events::AccountEvent;
use crate::error::LedgerError;

/// Entry point of the Ledger context.
///
/// Each command gets a fresh unit of work and repository; the unit of work is
/// committed only when the handler succeeds, so a rejected command leaves the
/// store untouched. A wired event bus still sees the events raised before the
/// rejection or a failed commit.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn DataStore<BankAccount>>,
    strategy: SharedStrategy<BankAccount>,
    clock: Arc<dyn Clock>,
    event_bus: Option<SharedEventBus<AccountEvent>>,
}

impl LedgerService {
    /// Creates a service over `store` using the strategy chosen by `config`.
    #[must_use]
    pub fn new(
        store: Arc<dyn DataStore<BankAccount>>,
        config: &PersistenceConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            strategy: config.strategy.build(),
            clock,
            event_bus: None,
        }
    }

    /// Publishes every account event raised through this service to
    /// `event_bus`.
    #[must_use]
    pub fn with_event_bus(mut self, event_bus: SharedEventBus<AccountEvent>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn repository(&self, unit_of_work: &UnitOfWork) -> Repository<BankAccount> {
        let repo = Repository::new(Arc::clone(&self.store), Arc::clone(&self.strategy))
            .with_clock(Arc::clone(&self.clock))
            .with_unit_of_work(unit_of_work);
        match &self.event_bus {
            Some(bus) => repo.with_event_bus(Arc::clone(bus)),
            None => repo,
        }
    }

    /// Opens an account.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the command is rejected or the commit fails.
    #[tracing::instrument(skip(self), fields(correlation_id = %command.correlation_id))]
    pub async fn open_account(
        &self,
        command: OpenAccount,
    ) -> Result<AccountCommandResult, LedgerError> {
        let unit_of_work = UnitOfWork::new();
        let repo = self.repository(&unit_of_work);
        let result =
            command_handlers::handle_open_account(&command, self.clock.as_ref(), &repo).await?;
        unit_of_work.commit().await?;
        Ok(result)
    }

    /// Credits an account.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the command is rejected or the commit fails.
    #[tracing::instrument(skip(self), fields(correlation_id = %command.correlation_id))]
    pub async fn deposit_funds(
        &self,
        command: DepositFunds,
    ) -> Result<AccountCommandResult, LedgerError> {
        let unit_of_work = UnitOfWork::new();
        let repo = self.repository(&unit_of_work);
        let result =
            command_handlers::handle_deposit_funds(&command, self.clock.as_ref(), &repo).await?;
        unit_of_work.commit().await?;
        Ok(result)
    }

    /// Debits an account.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the command is rejected or the commit fails.
    #[tracing::instrument(skip(self), fields(correlation_id = %command.correlation_id))]
    pub async fn withdraw_funds(
        &self,
        command: WithdrawFunds,
    ) -> Result<AccountCommandResult, LedgerError> {
        let unit_of_work = UnitOfWork::new();
        let repo = self.repository(&unit_of_work);
        let result =
            command_handlers::handle_withdraw_funds(&command, self.clock.as_ref(), &repo).await?;
        unit_of_work.commit().await?;
        Ok(result)
    }

    /// Moves funds between two accounts in one commit.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the command is rejected or the commit fails.
    #[tracing::instrument(skip(self), fields(correlation_id = %command.correlation_id))]
    pub async fn transfer_funds(
        &self,
        command: TransferFunds,
    ) -> Result<AccountCommandResult, LedgerError> {
        let unit_of_work = UnitOfWork::new();
        let repo = self.repository(&unit_of_work);
        let result =
            command_handlers::handle_transfer_funds(&command, self.clock.as_ref(), &repo).await?;
        unit_of_work.commit().await?;
        Ok(result)
    }

    /// Closes an account with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the command is rejected or the commit fails.
    #[tracing::instrument(skip(self), fields(correlation_id = %command.correlation_id))]
    pub async fn close_account(
        &self,
        command: CloseAccount,
    ) -> Result<AccountCommandResult, LedgerError> {
        let unit_of_work = UnitOfWork::new();
        let repo = self.repository(&unit_of_work);
        let result = command_handlers::handle_close_account(&command, &repo).await?;
        unit_of_work.commit().await?;
        Ok(result)
    }

    /// Returns the current view of an account.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the account does not exist or cannot be loaded.
    pub async fn get_account(&self, account_id: Uuid) -> Result<AccountView, LedgerError> {
        let unit_of_work = UnitOfWork::new();
        let repo = self.repository(&unit_of_work);
        query_handlers::get_account_by_id(account_id, &repo).await
    }
}

impl std::fmt::Debug for LedgerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerService")
            .field("strategy", &self.strategy)
            .field("event_bus", &self.event_bus.is_some())
            .finish_non_exhaustive()
    }
}
