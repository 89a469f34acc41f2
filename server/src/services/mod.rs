pub mod catalog;
pub mod gateway;
pub mod inventory;
pub mod order;
pub mod reporting;
pub mod settlement;

pub use catalog::{Catalog, CatalogError};
pub use gateway::{ApprovingGateway, PaymentGateway};
pub use inventory::{InventoryLedger, LedgerError};
pub use order::OrderError;
pub use reporting::ReportingAggregator;
pub use settlement::{SettlementEngine, SettlementError, SettlementRequest};
