//! Stock storage boundary.
//!
//! - `trait`: `StockStore` / `MovementLedger` contracts and the shared batch planner
//! - `in_memory`: lock-per-row implementation for tests and dev
//! - `postgres`: sqlx implementation (one transaction per commit)

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use r#trait::{AppliedDelta, MovementLedger, StockBackend, StockDelta, StockStore, StoreError};
