//! Multi-row stock commands: warehouse transfers and shipment deliveries.
//!
//! Both expand into several [`AdjustStock`] legs that storage commits as one
//! all-or-nothing batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, OrderId, ResourceId, ShipmentId, StockId, WarehouseId};

use crate::adjustment::AdjustStock;
use crate::movement::MovementKind;

/// Reason recorded on every exit produced by a shipment delivery.
pub const SHIPMENT_DELIVERED_REASON: &str = "Shipment delivered";

/// Command: move units of one resource from one stock row to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStock {
    pub from_stock: StockId,
    pub to_stock: StockId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
    pub order_id: Option<OrderId>,
    pub shipment_id: Option<ShipmentId>,
    pub reason: Option<String>,
}

impl TransferStock {
    pub fn new(from_stock: StockId, to_stock: StockId, quantity: i64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            from_stock,
            to_stock,
            quantity,
            occurred_at,
            order_id: None,
            shipment_id: None,
            reason: None,
        }
    }

    /// The exit leg followed by the entry leg, both of kind TRANSFER.
    pub fn legs(&self) -> DomainResult<[AdjustStock; 2]> {
        if self.quantity <= 0 {
            return Err(DomainError::invalid_argument(format!(
                "transfer quantity must be positive (provided: {})",
                self.quantity
            )));
        }
        if self.from_stock == self.to_stock {
            return Err(DomainError::invalid_argument(
                "transfer source and destination must differ",
            ));
        }

        let leg = |stock_id, delta| AdjustStock {
            stock_id,
            delta,
            occurred_at: self.occurred_at,
            kind: Some(MovementKind::Transfer),
            order_id: self.order_id,
            shipment_id: self.shipment_id,
            reason: self.reason.clone(),
            expected_version: Default::default(),
        };

        Ok([
            leg(self.from_stock, -self.quantity),
            leg(self.to_stock, self.quantity),
        ])
    }
}

/// One order line shipped out of the delivery's warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLine {
    pub resource_id: ResourceId,
    pub quantity: i64,
}

/// Command: a shipment reached its destination; consume its order lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentDelivery {
    pub shipment_id: ShipmentId,
    pub order_id: OrderId,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
    pub lines: Vec<DeliveryLine>,
}

impl ShipmentDelivery {
    pub fn validate(&self) -> DomainResult<()> {
        if self.lines.is_empty() {
            return Err(DomainError::invalid_argument(format!(
                "shipment {} has no order lines to deliver",
                self.shipment_id
            )));
        }
        for line in &self.lines {
            if line.quantity <= 0 {
                return Err(DomainError::invalid_argument(format!(
                    "order line quantity must be positive (provided: {}, order {})",
                    line.quantity, self.order_id
                )));
            }
        }
        Ok(())
    }

    /// Exit leg for `line`, taken from `stock_id`.
    pub fn exit_for(&self, stock_id: StockId, line: &DeliveryLine) -> AdjustStock {
        AdjustStock::new(stock_id, -line.quantity, self.occurred_at)
            .with_kind(MovementKind::Exit)
            .with_order(self.order_id)
            .with_shipment(self.shipment_id)
            .with_reason(SHIPMENT_DELIVERED_REASON)
    }
}
