use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ExpectedVersion, OrderId, ShipmentId, StockId};

use crate::movement::{MovementKind, NewMovement};

/// Command: AdjustStock.
///
/// The single way a stock quantity changes. `kind` may be left out, in which
/// case it is derived from the sign of `delta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub stock_id: StockId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
    pub kind: Option<MovementKind>,
    pub order_id: Option<OrderId>,
    pub shipment_id: Option<ShipmentId>,
    pub reason: Option<String>,
    #[serde(skip)]
    pub expected_version: ExpectedVersion,
}

impl AdjustStock {
    pub fn new(stock_id: StockId, delta: i64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            stock_id,
            delta,
            occurred_at,
            kind: None,
            order_id: None,
            shipment_id: None,
            reason: None,
            expected_version: ExpectedVersion::Any,
        }
    }

    pub fn with_kind(mut self, kind: MovementKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_shipment(mut self, shipment_id: ShipmentId) -> Self {
        self.shipment_id = Some(shipment_id);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Reject the adjustment unless the row is still at `version`.
    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = ExpectedVersion::Exact(version);
        self
    }

    /// Explicit kind if given (checked against the sign), else inferred from it.
    pub fn resolve_kind(&self) -> DomainResult<MovementKind> {
        if self.delta == 0 {
            return Err(DomainError::invalid_argument("stock adjustment delta cannot be zero"));
        }
        match self.kind {
            Some(kind) if kind.accepts_delta(self.delta) => Ok(kind),
            Some(kind) => Err(DomainError::invalid_argument(format!(
                "{kind} movement cannot carry a delta of {}",
                self.delta
            ))),
            None => MovementKind::from_delta(self.delta)
                .ok_or_else(|| DomainError::invalid_argument("stock adjustment delta cannot be zero")),
        }
    }

    /// The audit entry this adjustment produces once accepted.
    pub fn to_movement(&self) -> DomainResult<NewMovement> {
        let kind = self.resolve_kind()?;
        let quantity = i64::try_from(self.delta.unsigned_abs()).map_err(|_| {
            DomainError::invalid_argument(format!("delta {} is out of range", self.delta))
        })?;

        let movement = NewMovement::new(self.stock_id, kind, quantity, self.occurred_at)
            .with_order(self.order_id)
            .with_shipment(self.shipment_id)
            .with_reason(self.reason.clone());
        movement.validate()?;
        Ok(movement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjust(delta: i64) -> AdjustStock {
        AdjustStock::new(StockId::new(), delta, Utc::now())
    }

    #[test]
    fn positive_delta_becomes_entry() {
        let m = adjust(12).to_movement().unwrap();
        assert_eq!(m.kind, MovementKind::Entry);
        assert_eq!(m.quantity, 12);
    }

    #[test]
    fn negative_delta_becomes_exit_with_absolute_quantity() {
        let order_id = OrderId::new();
        let m = adjust(-20).with_order(order_id).to_movement().unwrap();
        assert_eq!(m.kind, MovementKind::Exit);
        assert_eq!(m.quantity, 20);
        assert_eq!(m.order_id, Some(order_id));
        assert_eq!(m.shipment_id, None);
    }

    #[test]
    fn zero_delta_is_invalid() {
        assert!(matches!(
            adjust(0).to_movement(),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn entry_with_negative_delta_is_invalid() {
        let err = adjust(-1).with_kind(MovementKind::Entry).resolve_kind().unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn transfer_keeps_explicit_kind_for_both_signs() {
        assert_eq!(
            adjust(-3).with_kind(MovementKind::Transfer).resolve_kind().unwrap(),
            MovementKind::Transfer
        );
        assert_eq!(
            adjust(3).with_kind(MovementKind::Transfer).resolve_kind().unwrap(),
            MovementKind::Transfer
        );
    }

    #[test]
    fn i64_min_delta_is_out_of_range() {
        assert!(adjust(i64::MIN).to_movement().is_err());
    }

    #[test]
    fn expecting_version_sets_exact_expectation() {
        let cmd = adjust(1).expecting_version(4);
        assert_eq!(cmd.expected_version, ExpectedVersion::Exact(4));
    }
}
