//! Chronicle Core: event-sourced aggregate persistence.
//!
//! This crate defines the aggregate model, the snapshot/event history units,
//! the serialization strategies that decide how history is materialized, the
//! data-store contract, and the repository/unit-of-work façade. It contains no
//! concrete storage.

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod repository;
pub mod snapshot;
pub mod store;
pub mod strategy;
pub mod unit_of_work;

#[cfg(test)]
pub(crate) mod testing;
