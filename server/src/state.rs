use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    Catalog, InventoryLedger, PaymentGateway, ReportingAggregator, SettlementEngine,
};
use crate::store::{Backend, PaymentStore, UserStore};

/// Shared handles for every request handler.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub ledger: Arc<InventoryLedger>,
    pub settlement: Arc<SettlementEngine>,
    pub reporting: ReportingAggregator,
    pub payments: Arc<dyn PaymentStore>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    /// Wires every service onto one storage backend.
    pub fn from_backend<B: Backend>(
        backend: Arc<B>,
        gateway: Arc<dyn PaymentGateway>,
        config: &Config,
    ) -> Self {
        let ledger = Arc::new(InventoryLedger::new(backend.clone(), config.reservation_ttl));
        let settlement = Arc::new(SettlementEngine::new(
            backend.clone(),
            backend.clone(),
            ledger.clone(),
            gateway,
            config.payment_timeout,
        ));

        Self {
            catalog: Catalog::new(backend.clone(), backend.clone()),
            ledger,
            settlement,
            reporting: ReportingAggregator::new(backend.clone()),
            payments: backend.clone(),
            users: backend,
        }
    }
}
