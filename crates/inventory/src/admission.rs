//! Order-item admission rule.
//!
//! Admission compares a requested quantity with the availability observed at
//! that moment. Nothing is reserved, so two requests evaluated concurrently can
//! both be admitted against the same units; the loser finds out later when its
//! stock exit is rejected with `InsufficientStock`.

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, OrderId, ResourceId};

/// Transient request to add a line to an order (never persisted here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub order_id: OrderId,
    pub resource_id: ResourceId,
    pub requested_quantity: i64,
}

/// Outcome of an accepted admission check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub resource_id: ResourceId,
    pub requested: u64,
    /// Availability observed at check time (advisory).
    pub available: u64,
}

impl AdmissionDecision {
    /// Admit `requested_quantity` units of `resource_id` if they fit in `available`.
    pub fn evaluate(resource_id: ResourceId, requested_quantity: i64, available: u64) -> DomainResult<Self> {
        let requested = requested_units(requested_quantity)?;
        if requested > available {
            return Err(DomainError::insufficient_stock(available, requested));
        }
        Ok(Self {
            resource_id,
            requested,
            available,
        })
    }
}

/// A requested quantity as units; must be positive.
pub fn requested_units(requested_quantity: i64) -> DomainResult<u64> {
    u64::try_from(requested_quantity)
        .ok()
        .filter(|units| *units > 0)
        .ok_or_else(|| {
            DomainError::invalid_argument(format!(
                "requested quantity must be positive (provided: {requested_quantity})"
            ))
        })
}

impl OrderItemRequest {
    pub fn new(order_id: OrderId, resource_id: ResourceId, requested_quantity: i64) -> Self {
        Self {
            order_id,
            resource_id,
            requested_quantity,
        }
    }

    pub fn validate(&self) -> DomainResult<u64> {
        requested_units(self.requested_quantity)
    }

    pub fn admit(&self, available: u64) -> DomainResult<AdmissionDecision> {
        AdmissionDecision::evaluate(self.resource_id, self.requested_quantity, available)
    }
}
