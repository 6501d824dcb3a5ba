//! Infrastructure layer: stock storage, the services built on it, config and startup wiring.

pub mod adjustment;
pub mod admission;
pub mod availability;
pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod error;
pub mod reporting;
pub mod store;

mod integration_tests;

pub use adjustment::StockAdjustmentService;
pub use admission::OrderItemAdmission;
pub use availability::{AvailabilityAggregator, WarehouseAvailability};
pub use bootstrap::{bootstrap, open_store, SharedStockBackend};
pub use catalog::{InMemoryReferenceCatalog, ReferenceCatalog};
pub use config::{ConfigError, InventoryConfig, ReportingThresholds, StorageBackend};
pub use error::InventoryError;
pub use reporting::{DailyMovementTotals, LowStockEntry, StockLevel, StockReporter};
