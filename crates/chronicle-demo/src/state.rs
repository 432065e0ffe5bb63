//! Shared application state.

use std::sync::Arc;

use chronicle_core::clock::Clock;
use chronicle_core::config::PersistenceConfig;
use chronicle_core::repository::Repository;
use chronicle_core::unit_of_work::UnitOfWork;
use chronicle_event_store::InMemoryDataStore;
use chronicle_ledger::application::audit::AuditTrail;
use chronicle_ledger::application::service::LedgerService;
use chronicle_ledger::domain::aggregates::BankAccount;

/// Everything the scenario needs: the store, the ledger service over it and
/// the audit trail every event is published to.
#[derive(Clone)]
pub struct AppState {
    /// The backing store.
    pub store: InMemoryDataStore<BankAccount>,
    /// Ledger entry point.
    pub service: LedgerService,
    /// Published account events.
    pub audit: Arc<AuditTrail>,
    /// Clock shared with the service.
    pub clock: Arc<dyn Clock>,
    config: PersistenceConfig,
}

impl AppState {
    /// Create new application state over an empty store.
    #[must_use]
    pub fn new(config: PersistenceConfig, clock: Arc<dyn Clock>) -> Self {
        let store = InMemoryDataStore::new();
        let audit = Arc::new(AuditTrail::new());
        let service = LedgerService::new(Arc::new(store.clone()), &config, Arc::clone(&clock))
            .with_event_bus(audit.clone());
        Self {
            store,
            service,
            audit,
            clock,
            config,
        }
    }

    /// Returns the persistence configuration in use.
    #[must_use]
    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    /// Builds a repository over the shared store that writes through
    /// `unit_of_work`. Events raised through it are not published.
    #[must_use]
    pub fn repository(&self, unit_of_work: &UnitOfWork) -> Repository<BankAccount> {
        Repository::new(Arc::new(self.store.clone()), self.config.strategy.build())
            .with_clock(Arc::clone(&self.clock))
            .with_unit_of_work(unit_of_work)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store)
            .field("service", &self.service)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
