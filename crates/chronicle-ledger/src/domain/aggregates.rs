//! Aggregate roots for the Ledger context.

use chronicle_core::aggregate::{AggregateCore, AggregateRoot, Snapshotting};
use chronicle_core::clock::Clock;
use chronicle_core::error::DomainError;
use chronicle_core::event::{EventMetadata, SharedEventBus};
use chronicle_core::snapshot::SnapshotOrEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    AccountClosed, AccountEvent, AccountEventKind, AccountOpened, FundsDeposited, FundsWithdrawn,
};

/// Full state of a [`BankAccount`] at one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// The account identifier.
    pub account_id: Uuid,
    /// Version of the last event folded into this snapshot.
    pub version: i64,
    /// The account holder.
    pub owner: String,
    /// Balance in minor units.
    pub balance: i64,
}

impl SnapshotOrEvent for AccountSnapshot {
    type Id = Uuid;
    type Version = i64;

    fn aggregate_id(&self) -> &Uuid {
        &self.account_id
    }

    fn version(&self) -> &i64 {
        &self.version
    }
}

/// The aggregate root for a bank account.
#[derive(Debug)]
pub struct BankAccount {
    core: AggregateCore<AccountEvent>,
    owner: String,
    balance: i64,
    /// Correlation ID recorded on the closing event.
    closing_correlation_id: Option<Uuid>,
}

impl BankAccount {
    /// Creates an account that has not been opened yet.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            core: AggregateCore::new(id),
            owner: String::new(),
            balance: 0,
            closing_correlation_id: None,
        }
    }

    /// Wires an event bus that receives every event raised from now on.
    #[must_use]
    pub fn with_event_bus(mut self, event_bus: SharedEventBus<AccountEvent>) -> Self {
        self.core.set_event_bus(Some(event_bus));
        self
    }

    /// Returns the account identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        *self.core.id()
    }

    /// Returns the account holder.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the balance in minor units.
    #[must_use]
    pub fn balance(&self) -> i64 {
        self.balance
    }

    /// Opens the account, producing an `AccountOpened` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `owner` is blank, or
    /// `DomainError::InvalidState` if the account already has history.
    pub fn open(
        &mut self,
        owner: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if *self.core.version() != 0 {
            return Err(DomainError::InvalidState(format!(
                "account {} is already open",
                self.id()
            )));
        }
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(DomainError::Validation(
                "account owner must not be blank".to_owned(),
            ));
        }
        self.raise_kind(
            AccountEventKind::AccountOpened(AccountOpened {
                account_id: self.id(),
                owner: owner.to_owned(),
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Credits the account, producing a `FundsDeposited` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `amount` is not positive, or
    /// `DomainError::InvalidState` if the balance cannot hold it.
    pub fn deposit(
        &mut self,
        amount: i64,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_open()?;
        ensure_positive(amount)?;
        if self.balance.checked_add(amount).is_none() {
            return Err(DomainError::InvalidState(format!(
                "deposit of {amount} would overflow the balance of account {}",
                self.id()
            )));
        }
        self.raise_kind(
            AccountEventKind::FundsDeposited(FundsDeposited {
                account_id: self.id(),
                amount,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Debits the account, producing a `FundsWithdrawn` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `amount` is not positive, or
    /// `DomainError::InvalidState` if the balance does not cover it.
    pub fn withdraw(
        &mut self,
        amount: i64,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_open()?;
        ensure_positive(amount)?;
        if amount > self.balance {
            return Err(DomainError::InvalidState(format!(
                "insufficient funds in account {}: balance {}, requested {amount}",
                self.id(),
                self.balance
            )));
        }
        self.raise_kind(
            AccountEventKind::FundsWithdrawn(FundsWithdrawn {
                account_id: self.id(),
                amount,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Checks that the account may be closed and records the correlation ID
    /// the closing event will carry.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the balance is not zero.
    pub fn prepare_close(&mut self, correlation_id: Uuid) -> Result<(), DomainError> {
        self.ensure_open()?;
        if self.balance != 0 {
            return Err(DomainError::InvalidState(format!(
                "account {} still holds {}",
                self.id(),
                self.balance
            )));
        }
        self.closing_correlation_id = Some(correlation_id);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if *self.core.version() == 0 || self.core.is_removed() {
            return Err(DomainError::InvalidState(format!(
                "account {} is not open",
                self.id()
            )));
        }
        Ok(())
    }

    fn raise_kind(&mut self, kind: AccountEventKind, correlation_id: Uuid, clock: &dyn Clock) {
        // TODO: event_id uses Uuid::new_v4(); derive it from the command once
        // commands carry an idempotency key.
        let event = AccountEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                aggregate_id: self.id(),
                version: self.core.next_version(),
                correlation_id,
                causation_id: correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        };
        self.raise(event);
    }
}

fn ensure_positive(amount: i64) -> Result<(), DomainError> {
    if amount <= 0 {
        return Err(DomainError::Validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

impl AggregateRoot for BankAccount {
    type Id = Uuid;
    type Version = i64;
    type Event = AccountEvent;
    type Snapshot = AccountSnapshot;

    fn core(&self) -> &AggregateCore<AccountEvent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AggregateCore<AccountEvent> {
        &mut self.core
    }

    fn restore(first_event: &AccountEvent) -> Option<Self> {
        if !matches!(first_event.kind, AccountEventKind::AccountOpened(_)) {
            return None;
        }
        let mut account = Self::new(first_event.metadata.aggregate_id);
        account.replay(first_event);
        Some(account)
    }

    fn apply(&mut self, event: &AccountEvent) {
        match &event.kind {
            AccountEventKind::AccountOpened(payload) => {
                self.owner.clone_from(&payload.owner);
            }
            AccountEventKind::FundsDeposited(payload) => {
                self.balance += payload.amount;
            }
            AccountEventKind::FundsWithdrawn(payload) => {
                self.balance -= payload.amount;
            }
            AccountEventKind::AccountClosed(_) => {}
        }
    }

    fn on_remove(&mut self, clock: &dyn Clock) {
        let correlation_id = self.closing_correlation_id.unwrap_or_else(Uuid::new_v4);
        self.raise_kind(
            AccountEventKind::AccountClosed(AccountClosed {
                account_id: self.id(),
            }),
            correlation_id,
            clock,
        );
    }
}

impl Snapshotting for BankAccount {
    fn take_snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            account_id: self.id(),
            version: *self.core.version(),
            owner: self.owner.clone(),
            balance: self.balance,
        }
    }

    fn restore_snapshot(snapshot: &AccountSnapshot) -> Self {
        Self {
            core: AggregateCore::restored(snapshot.account_id, snapshot.version),
            owner: snapshot.owner.clone(),
            balance: snapshot.balance,
            closing_correlation_id: None,
        }
    }
}
