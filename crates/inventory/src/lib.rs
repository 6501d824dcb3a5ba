//! Inventory domain module (stock ledger rules).
//!
//! This crate contains business rules for stock quantities, the movement audit
//! trail and order-item admission, implemented purely as deterministic domain
//! logic (no IO, no storage, no clocks).

pub mod adjustment;
pub mod admission;
pub mod fulfillment;
pub mod movement;
pub mod stock;

pub use adjustment::AdjustStock;
pub use admission::{requested_units, AdmissionDecision, OrderItemRequest};
pub use fulfillment::{DeliveryLine, ShipmentDelivery, TransferStock, SHIPMENT_DELIVERED_REASON};
pub use movement::{sort_newest_first, MovementKind, MovementRecord, NewMovement, MAX_REASON_LEN};
pub use stock::StockRecord;
