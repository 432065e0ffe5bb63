//! Chronicle Ledger: bank account bounded context.
//!
//! Responsible for opening, funding, debiting, transferring between and
//! closing accounts. Every command runs inside one unit of work and is
//! persisted through the aggregate repository.

pub mod application;
pub mod domain;
pub mod error;

pub use error::LedgerError;
