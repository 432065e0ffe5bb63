//! Audit trail: an event bus that keeps a JSON record of every account event.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use chronicle_core::event::{DomainEvent, EventBus};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::events::AccountEvent;

/// One published account event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    /// Event type name.
    pub event_type: &'static str,
    /// The account the event belongs to.
    pub account_id: Uuid,
    /// Version the event brought the account to.
    pub version: i64,
    /// Correlation ID of the command that raised it.
    pub correlation_id: Uuid,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
    /// The event payload.
    pub payload: serde_json::Value,
}

/// Event bus that logs and remembers every account event it receives.
///
/// Events arrive when an aggregate raises them, before any commit. An entry
/// may therefore belong to a command whose commit later failed; the trail is
/// a record of what was attempted, not of what the store holds.
#[derive(Debug, Default)]
pub struct AuditTrail {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditTrail {
    /// Creates an empty trail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded entries in publication order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the entries recorded for `account_id`.
    pub fn entries_for(&self, account_id: Uuid) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.account_id == account_id)
            .collect()
    }
}

impl EventBus<AccountEvent> for AuditTrail {
    fn publish(&self, event: &AccountEvent) {
        let payload = match event.to_payload() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "account event payload not serializable");
                serde_json::Value::Null
            }
        };
        let metadata = event.metadata();
        tracing::info!(
            event_type = event.event_type(),
            account_id = %metadata.aggregate_id,
            version = metadata.version,
            correlation_id = %metadata.correlation_id,
            "account event"
        );
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(AuditEntry {
                event_type: event.event_type(),
                account_id: metadata.aggregate_id,
                version: metadata.version,
                correlation_id: metadata.correlation_id,
                occurred_at: metadata.occurred_at,
                payload,
            });
    }
}
