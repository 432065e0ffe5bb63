//! The scripted ledger scenario.
//!
//! Opens a ring of accounts, moves money around it, and then provokes the
//! failures the persistence layer is expected to report: a rejected
//! overdraft and a stale concurrent writer.

use chronicle_core::config::ConfigError;
use chronicle_core::error::ErrorClass;
use chronicle_core::unit_of_work::UnitOfWork;
use chronicle_ledger::LedgerError;
use chronicle_ledger::application::command_handlers::{self, AccountCommandResult};
use chronicle_ledger::application::query_handlers::AccountView;
use chronicle_ledger::domain::commands::{
    CloseAccount, DepositFunds, OpenAccount, TransferFunds, WithdrawFunds,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

/// Environment variable holding the number of accounts to open.
pub const CHRONICLE_DEMO_ACCOUNTS: &str = "CHRONICLE_DEMO_ACCOUNTS";

/// Accounts opened when `CHRONICLE_DEMO_ACCOUNTS` is unset.
pub const DEFAULT_ACCOUNTS: usize = 3;

/// Amount credited to every account right after opening.
pub const OPENING_DEPOSIT: i64 = 100;

const RING_TRANSFER: i64 = 25;
const CONTESTED_WITHDRAWAL: i64 = 10;
const OWNERS: [&str; 5] = ["Ada", "Grace", "Edsger", "Barbara", "Alan"];

/// Scenario settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioConfig {
    /// Number of accounts in the ring; at least two.
    pub accounts: usize,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            accounts: DEFAULT_ACCOUNTS,
        }
    }
}

impl ScenarioConfig {
    /// Reads the settings through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidNumber` unless the account count is an
    /// integer of at least two.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(raw) = lookup(CHRONICLE_DEMO_ACCOUNTS) else {
            return Ok(Self::default());
        };
        match raw.trim().parse::<usize>() {
            Ok(accounts) if accounts >= 2 => Ok(Self { accounts }),
            _ => Err(ConfigError::InvalidNumber {
                name: CHRONICLE_DEMO_ACCOUNTS.to_owned(),
                value: raw,
            }),
        }
    }
}

/// How a step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The step was committed.
    Applied {
        /// Events the step produced.
        events: usize,
    },
    /// The step was refused.
    Rejected(ErrorBody),
}

/// One executed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// What was attempted.
    pub step: String,
    /// How it ended.
    pub outcome: Outcome,
}

/// Result of a scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// The serialization strategy the store was written with.
    pub strategy: String,
    /// Every step in execution order.
    pub steps: Vec<StepReport>,
    /// Final view of every account still open.
    pub accounts: Vec<AccountView>,
    /// Number of events the audit trail received.
    pub published_events: usize,
}

impl ScenarioReport {
    /// Returns the steps that were refused.
    pub fn rejected(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|step| matches!(step.outcome, Outcome::Rejected(_)))
    }
}

fn record(step: String, result: Result<usize, LedgerError>) -> StepReport {
    let outcome = match result {
        Ok(events) => {
            tracing::info!(%step, events, "step applied");
            Outcome::Applied { events }
        }
        Err(err) => {
            tracing::warn!(%step, error = %err, "step rejected");
            Outcome::Rejected(ErrorBody::from(&err))
        }
    };
    StepReport { step, outcome }
}

fn event_count(result: Result<AccountCommandResult, LedgerError>) -> Result<usize, LedgerError> {
    result.map(|r| r.events.len())
}

fn withdrawal(account_id: Uuid, amount: i64) -> WithdrawFunds {
    WithdrawFunds {
        correlation_id: Uuid::new_v4(),
        account_id,
        amount,
    }
}

/// Runs the scenario against `state`.
///
/// # Errors
///
/// Returns `AppError::Ledger` if a step the scenario depends on fails.
#[tracing::instrument(skip(state), fields(strategy = %state.config().strategy))]
pub async fn run(state: &AppState, config: ScenarioConfig) -> Result<ScenarioReport, AppError> {
    let service = &state.service;
    let mut steps = Vec::new();

    let mut account_ids = Vec::with_capacity(config.accounts);
    for index in 0..config.accounts {
        let account_id = Uuid::new_v4();
        let owner = OWNERS[index % OWNERS.len()];
        let opened = service
            .open_account(OpenAccount {
                correlation_id: Uuid::new_v4(),
                account_id,
                owner: owner.to_owned(),
            })
            .await?;
        steps.push(record(format!("open account for {owner}"), Ok(opened.events.len())));
        let deposited = service
            .deposit_funds(DepositFunds {
                correlation_id: Uuid::new_v4(),
                account_id,
                amount: OPENING_DEPOSIT,
            })
            .await?;
        steps.push(record(
            format!("deposit {OPENING_DEPOSIT} for {owner}"),
            Ok(deposited.events.len()),
        ));
        account_ids.push(account_id);
    }

    for (index, &from) in account_ids.iter().enumerate() {
        let to = account_ids[(index + 1) % account_ids.len()];
        let result = service
            .transfer_funds(TransferFunds {
                correlation_id: Uuid::new_v4(),
                from_account_id: from,
                to_account_id: to,
                amount: RING_TRANSFER,
            })
            .await;
        steps.push(record(
            format!("transfer {RING_TRANSFER} from account {index}"),
            event_count(result),
        ));
    }

    let first = account_ids[0];
    let overdraft = OPENING_DEPOSIT * 10;
    let result = service.withdraw_funds(withdrawal(first, overdraft)).await;
    steps.push(record(format!("withdraw {overdraft} from account 0"), event_count(result)));

    steps.extend(contested_withdrawals(state, first).await?);

    let last = account_ids[account_ids.len() - 1];
    let balance = service.get_account(last).await?.balance;
    let result = service.withdraw_funds(withdrawal(last, balance)).await;
    steps.push(record("empty last account".to_owned(), event_count(result)));
    let result = service
        .close_account(CloseAccount {
            correlation_id: Uuid::new_v4(),
            account_id: last,
        })
        .await;
    steps.push(record("close last account".to_owned(), event_count(result)));

    let mut accounts = Vec::new();
    for &account_id in &account_ids {
        match service.get_account(account_id).await {
            Ok(view) => accounts.push(view),
            Err(err) if err.class() == ErrorClass::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }

    Ok(ScenarioReport {
        strategy: state.config().strategy.to_string(),
        steps,
        accounts,
        published_events: state.audit.entries().len(),
    })
}

/// Two units of work withdraw from the same account at the same version.
/// The first commit wins; the second is refused by the store.
async fn contested_withdrawals(
    state: &AppState,
    account_id: Uuid,
) -> Result<Vec<StepReport>, AppError> {
    let first = UnitOfWork::new();
    let second = UnitOfWork::new();
    let first_repo = state.repository(&first);
    let second_repo = state.repository(&second);
    let clock = state.clock.as_ref();

    let first_result = command_handlers::handle_withdraw_funds(
        &withdrawal(account_id, CONTESTED_WITHDRAWAL),
        clock,
        &first_repo,
    )
    .await?;
    let second_result = command_handlers::handle_withdraw_funds(
        &withdrawal(account_id, CONTESTED_WITHDRAWAL),
        clock,
        &second_repo,
    )
    .await?;

    let first_commit = first.commit().await.map_err(LedgerError::from);
    let second_commit = second.commit().await.map_err(LedgerError::from);
    Ok(vec![
        record(
            "first concurrent withdrawal".to_owned(),
            first_commit.map(|()| first_result.events.len()),
        ),
        record(
            "stale concurrent withdrawal".to_owned(),
            second_commit.map(|()| second_result.events.len()),
        ),
    ])
}
