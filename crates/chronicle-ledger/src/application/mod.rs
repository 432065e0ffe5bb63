//! Application layer: command and query handlers plus the service that wraps
//! each command in a unit of work.

pub mod audit;
pub mod command_handlers;
pub mod query_handlers;
pub mod service;
