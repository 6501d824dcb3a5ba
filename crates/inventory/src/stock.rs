use serde::{Deserialize, Serialize};

use stockledger_core::{AggregateRoot, DomainError, DomainResult, Entity, ResourceId, StockId, WarehouseId};

/// Aggregate root: on-hand quantity of one resource in one warehouse.
///
/// The quantity is never negative. It changes only through [`StockRecord::apply_delta`],
/// which returns the next state instead of mutating in place so storage can
/// commit the new state together with its movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    id: StockId,
    resource_id: ResourceId,
    warehouse_id: WarehouseId,
    quantity: u64,
    version: u64,
}

impl StockRecord {
    /// First stocking of a resource in a warehouse.
    pub fn create(
        id: StockId,
        resource_id: ResourceId,
        warehouse_id: WarehouseId,
        initial_quantity: i64,
    ) -> DomainResult<Self> {
        let quantity = u64::try_from(initial_quantity).map_err(|_| {
            DomainError::invalid_argument(format!(
                "initial stock quantity cannot be negative (provided: {initial_quantity})"
            ))
        })?;

        Ok(Self {
            id,
            resource_id,
            warehouse_id,
            quantity,
            version: 0,
        })
    }

    /// Rehydrate a record loaded from storage.
    pub fn restore(
        id: StockId,
        resource_id: ResourceId,
        warehouse_id: WarehouseId,
        quantity: u64,
        version: u64,
    ) -> Self {
        Self {
            id,
            resource_id,
            warehouse_id,
            quantity,
            version,
        }
    }

    pub fn id_typed(&self) -> StockId {
        self.id
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    /// Compute the state after adding `delta`.
    ///
    /// Fails with `InsufficientStock` when the result would be negative; `self`
    /// is untouched either way.
    pub fn apply_delta(&self, delta: i64) -> DomainResult<Self> {
        if delta == 0 {
            return Err(DomainError::invalid_argument("stock adjustment delta cannot be zero"));
        }

        let quantity = match self.quantity.checked_add_signed(delta) {
            Some(q) => q,
            None if delta < 0 => {
                return Err(DomainError::insufficient_stock(
                    self.quantity,
                    delta.unsigned_abs(),
                ));
            }
            None => {
                return Err(DomainError::invalid_argument(format!(
                    "adding {delta} to {} overflows the stock quantity",
                    self.quantity
                )));
            }
        };

        Ok(Self {
            quantity,
            version: self.version + 1,
            ..self.clone()
        })
    }
}

impl Entity for StockRecord {
    type Id = StockId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl AggregateRoot for StockRecord {
    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stocked(quantity: i64) -> StockRecord {
        StockRecord::create(StockId::new(), ResourceId::new(), WarehouseId::new(), quantity).unwrap()
    }

    #[test]
    fn create_rejects_negative_initial_quantity() {
        let err = StockRecord::create(StockId::new(), ResourceId::new(), WarehouseId::new(), -1)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn create_accepts_zero() {
        let stock = stocked(0);
        assert_eq!(stock.quantity(), 0);
        assert_eq!(stock.version(), 0);
    }

    #[test]
    fn removal_within_quantity_is_accepted() {
        let stock = stocked(50);
        let next = stock.apply_delta(-20).unwrap();
        assert_eq!(next.quantity(), 30);
        assert_eq!(next.version(), 1);
        assert_eq!(next.id_typed(), stock.id_typed());
        // Original untouched.
        assert_eq!(stock.quantity(), 50);
    }

    #[test]
    fn removal_below_zero_is_insufficient_stock() {
        let stock = stocked(30);
        let err = stock.apply_delta(-50).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(30, 50));
        assert_eq!(stock.quantity(), 30);
    }

    #[test]
    fn removing_everything_reaches_exactly_zero() {
        let next = stocked(15).apply_delta(-15).unwrap();
        assert_eq!(next.quantity(), 0);
    }

    #[test]
    fn zero_delta_is_invalid() {
        let err = stocked(5).apply_delta(0).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn overflow_is_invalid_not_insufficient() {
        let stock = StockRecord::restore(StockId::new(), ResourceId::new(), WarehouseId::new(), u64::MAX, 3);
        let err = stock.apply_delta(1).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of deltas is attempted, accepted ones keep
        /// the quantity non-negative and rejected ones leave it unchanged.
        #[test]
        fn quantity_never_goes_negative(
            initial in 0i64..1_000,
            deltas in prop::collection::vec(-500i64..500i64, 1..40)
        ) {
            let mut stock = stocked(initial);
            let mut expected = initial;

            for delta in deltas {
                match stock.apply_delta(delta) {
                    Ok(next) => {
                        expected += delta;
                        prop_assert!(expected >= 0);
                        prop_assert_eq!(next.quantity(), expected as u64);
                        prop_assert_eq!(next.version(), stock.version() + 1);
                        stock = next;
                    }
                    Err(DomainError::InsufficientStock { available, .. }) => {
                        prop_assert!(expected + delta < 0);
                        prop_assert_eq!(available, expected as u64);
                    }
                    Err(DomainError::InvalidArgument(_)) => prop_assert_eq!(delta, 0),
                    Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                }
            }
        }
    }
}
