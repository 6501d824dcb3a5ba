//! Cross-warehouse availability (read-only).

use serde::{Deserialize, Serialize};

use stockledger_core::{ResourceId, StockId, WarehouseId};

use crate::error::InventoryError;
use crate::store::StockStore;

/// Quantity of a resource held in one warehouse.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseAvailability {
    pub warehouse_id: WarehouseId,
    pub stock_id: StockId,
    pub quantity: u64,
}

#[derive(Debug, Clone)]
pub struct AvailabilityAggregator<S> {
    store: S,
}

impl<S> AvailabilityAggregator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: StockStore> AvailabilityAggregator<S> {
    /// Sum of on-hand quantity over every warehouse; 0 when the resource is not stocked anywhere.
    pub fn total_available(&self, resource_id: ResourceId) -> Result<u64, InventoryError> {
        Ok(self
            .store
            .list_for_resource(resource_id)?
            .iter()
            .fold(0u64, |total, stock| total.saturating_add(stock.quantity())))
    }

    /// Per-warehouse breakdown, ordered by warehouse id.
    pub fn by_warehouse(&self, resource_id: ResourceId) -> Result<Vec<WarehouseAvailability>, InventoryError> {
        let mut out: Vec<WarehouseAvailability> = self
            .store
            .list_for_resource(resource_id)?
            .into_iter()
            .map(|stock| WarehouseAvailability {
                warehouse_id: stock.warehouse_id(),
                stock_id: stock.id_typed(),
                quantity: stock.quantity(),
            })
            .collect();
        out.sort_by_key(|w| w.warehouse_id);
        Ok(out)
    }
}
