//! Query handlers for the Ledger context.
//!
//! Queries load accounts through the repository and return read-only view
//! DTOs. They never modify the accounts they load.

use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::repository::Repository;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::BankAccount;
use crate::error::LedgerError;

/// Read-only view of an account aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    /// The account identifier.
    pub account_id: Uuid,
    /// The account holder.
    pub owner: String,
    /// Balance in minor units.
    pub balance: i64,
    /// Current version (number of events applied).
    pub version: i64,
}

impl From<&BankAccount> for AccountView {
    fn from(account: &BankAccount) -> Self {
        Self {
            account_id: account.id(),
            owner: account.owner().to_owned(),
            balance: account.balance(),
            version: *account.version(),
        }
    }
}

/// Retrieves an account by its aggregate ID.
///
/// # Errors
///
/// Returns `LoadError::NotFound` if the account does not exist, or the load
/// failure of the repository.
pub async fn get_account_by_id(
    account_id: Uuid,
    repo: &Repository<BankAccount>,
) -> Result<AccountView, LedgerError> {
    let handle = repo.get_by_id(&account_id).await?;
    let account = handle.lock().await;
    Ok(AccountView::from(&*account))
}
