//! Commands for the Ledger context.

use uuid::Uuid;

/// Command to open an account.
#[derive(Debug, Clone)]
pub struct OpenAccount {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The account identifier.
    pub account_id: Uuid,
    /// The account holder.
    pub owner: String,
}

/// Command to credit an account.
#[derive(Debug, Clone)]
pub struct DepositFunds {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The account identifier.
    pub account_id: Uuid,
    /// Amount in minor units.
    pub amount: i64,
}

/// Command to debit an account.
#[derive(Debug, Clone)]
pub struct WithdrawFunds {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The account identifier.
    pub account_id: Uuid,
    /// Amount in minor units.
    pub amount: i64,
}

/// Command to move funds between two accounts.
#[derive(Debug, Clone)]
pub struct TransferFunds {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The account debited.
    pub from_account_id: Uuid,
    /// The account credited.
    pub to_account_id: Uuid,
    /// Amount in minor units.
    pub amount: i64,
}

/// Command to close an account with a zero balance.
#[derive(Debug, Clone)]
pub struct CloseAccount {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The account identifier.
    pub account_id: Uuid,
}
