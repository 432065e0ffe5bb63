//! Domain events for the Ledger context.

use chronicle_core::event::{DomainEvent, EventMetadata};
use chronicle_core::snapshot::SnapshotOrEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type name for [`AccountOpened`].
pub const ACCOUNT_OPENED_EVENT_TYPE: &str = "ledger.account_opened";
/// Event type name for [`FundsDeposited`].
pub const FUNDS_DEPOSITED_EVENT_TYPE: &str = "ledger.funds_deposited";
/// Event type name for [`FundsWithdrawn`].
pub const FUNDS_WITHDRAWN_EVENT_TYPE: &str = "ledger.funds_withdrawn";
/// Event type name for [`AccountClosed`].
pub const ACCOUNT_CLOSED_EVENT_TYPE: &str = "ledger.account_closed";

/// Emitted when an account is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOpened {
    /// The account identifier.
    pub account_id: Uuid,
    /// The account holder.
    pub owner: String,
}

/// Emitted when funds are credited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsDeposited {
    /// The account identifier.
    pub account_id: Uuid,
    /// Amount in minor units.
    pub amount: i64,
}

/// Emitted when funds are debited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsWithdrawn {
    /// The account identifier.
    pub account_id: Uuid,
    /// Amount in minor units.
    pub amount: i64,
}

/// Emitted when an account is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountClosed {
    /// The account identifier.
    pub account_id: Uuid,
}

/// Event payload variants for the Ledger context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEventKind {
    /// An account has been opened.
    AccountOpened(AccountOpened),
    /// Funds have been deposited.
    FundsDeposited(FundsDeposited),
    /// Funds have been withdrawn.
    FundsWithdrawn(FundsWithdrawn),
    /// The account has been closed.
    AccountClosed(AccountClosed),
}

impl AccountEventKind {
    /// Returns the event type name of this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AccountOpened(_) => ACCOUNT_OPENED_EVENT_TYPE,
            Self::FundsDeposited(_) => FUNDS_DEPOSITED_EVENT_TYPE,
            Self::FundsWithdrawn(_) => FUNDS_WITHDRAWN_EVENT_TYPE,
            Self::AccountClosed(_) => ACCOUNT_CLOSED_EVENT_TYPE,
        }
    }
}

/// Domain event envelope for the Ledger context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountEvent {
    /// Event metadata.
    pub metadata: EventMetadata<Uuid, i64>,
    /// Event-specific payload.
    pub kind: AccountEventKind,
}

impl AccountEvent {
    /// Serializes the payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the payload cannot be represented.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.kind)
    }
}

impl SnapshotOrEvent for AccountEvent {
    type Id = Uuid;
    type Version = i64;

    fn aggregate_id(&self) -> &Uuid {
        &self.metadata.aggregate_id
    }

    fn version(&self) -> &i64 {
        &self.metadata.version
    }
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn metadata(&self) -> &EventMetadata<Uuid, i64> {
        &self.metadata
    }
}
