//! Order-item admission against current availability.
//!
//! Advisory only: the check reads committed availability and reserves
//! nothing. Two admissions racing for the same units can both succeed; the
//! later stock exit then fails with `InsufficientStock`.

use tracing::debug;

use stockledger_core::ResourceId;
use stockledger_inventory::{AdmissionDecision, OrderItemRequest};

use crate::availability::AvailabilityAggregator;
use crate::error::InventoryError;
use crate::store::StockStore;

#[derive(Debug, Clone)]
pub struct OrderItemAdmission<S> {
    availability: AvailabilityAggregator<S>,
}

impl<S> OrderItemAdmission<S> {
    pub fn new(store: S) -> Self {
        Self {
            availability: AvailabilityAggregator::new(store),
        }
    }
}

impl<S: StockStore> OrderItemAdmission<S> {
    /// Accept `requested_quantity` units of `resource_id` if they are available
    /// across all warehouses right now.
    pub fn validate(
        &self,
        resource_id: ResourceId,
        requested_quantity: i64,
    ) -> Result<AdmissionDecision, InventoryError> {
        let available = self.availability.total_available(resource_id)?;

        AdmissionDecision::evaluate(resource_id, requested_quantity, available).map_err(|e| {
            debug!(resource_id = %resource_id, requested_quantity, available, "order item not admitted");
            e.into()
        })
    }

    pub fn admit(&self, request: &OrderItemRequest) -> Result<AdmissionDecision, InventoryError> {
        self.validate(request.resource_id, request.requested_quantity)
    }
}
