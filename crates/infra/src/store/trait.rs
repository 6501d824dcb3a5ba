use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use stockledger_core::{
    AggregateRoot, DomainError, DomainResult, ExpectedVersion, MovementId, OrderId, ResourceId, ShipmentId, StockId,
    WarehouseId,
};
use stockledger_inventory::{AdjustStock, MovementRecord, NewMovement, StockRecord};

/// Stock store operation error.
///
/// `Domain` carries deterministic rejections (insufficient stock, not found,
/// duplicates). The other variants are storage faults:
///
/// - **Concurrency**: an `ExpectedVersion::Exact` check failed
/// - **Transient**: the backend aborted the unit of work (serialization failure,
///   deadlock); safe to retry from scratch
/// - **Storage**: anything else; the unit of work was rolled back
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("transient storage conflict: {0}")]
    Transient(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// One leg of an atomic stock commit: a signed delta plus the movement that explains it.
///
/// The movement's `stock_id` names the row the delta applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDelta {
    pub delta: i64,
    pub expected_version: ExpectedVersion,
    pub movement: NewMovement,
}

impl StockDelta {
    pub fn stock_id(&self) -> StockId {
        self.movement.stock_id
    }

    /// Translate an adjustment command into a commit leg (kind resolved, movement validated).
    pub fn from_adjustment(cmd: &AdjustStock) -> DomainResult<Self> {
        Ok(Self {
            delta: cmd.delta,
            expected_version: cmd.expected_version,
            movement: cmd.to_movement()?,
        })
    }

    fn validate(&self) -> DomainResult<()> {
        let quantity = self.movement.validate()?;
        if quantity != self.delta.unsigned_abs() {
            return Err(DomainError::invalid_argument(format!(
                "movement quantity {quantity} does not match delta {}",
                self.delta
            )));
        }
        if !self.movement.kind.accepts_delta(self.delta) {
            return Err(DomainError::invalid_argument(format!(
                "{} movement cannot carry a delta of {}",
                self.movement.kind, self.delta
            )));
        }
        Ok(())
    }
}

/// A committed leg: the row after the delta and the ledger entry appended with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedDelta {
    pub stock: StockRecord,
    pub movement: MovementRecord,
}

/// Current on-hand quantity per (resource, warehouse) pair.
///
/// ## Atomicity
///
/// `apply_deltas` is the only write path for quantities. Every leg's new
/// quantity and its movement are committed together with all other legs of the
/// batch, or nothing is. Readers never observe a quantity without its
/// movement or the other way around.
///
/// ## Isolation
///
/// Implementations serialize writers per row (row lock or transaction with
/// `FOR UPDATE`); batches touching disjoint rows do not wait for each other.
pub trait StockStore: Send + Sync {
    /// Load a row; `NotFound` if it does not exist.
    fn get(&self, stock_id: StockId) -> Result<StockRecord, StoreError>;

    /// Lookup by identity pair.
    fn find(
        &self,
        resource_id: ResourceId,
        warehouse_id: WarehouseId,
    ) -> Result<Option<StockRecord>, StoreError>;

    /// First stocking of a resource in a warehouse.
    ///
    /// `InvalidArgument` if `initial_quantity < 0`, `Conflict` if the pair is
    /// already stocked. A positive initial quantity is recorded as an ENTRY.
    fn create(
        &self,
        resource_id: ResourceId,
        warehouse_id: WarehouseId,
        initial_quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<StockRecord, StoreError>;

    fn list_for_resource(&self, resource_id: ResourceId) -> Result<Vec<StockRecord>, StoreError>;

    fn list_all(&self) -> Result<Vec<StockRecord>, StoreError>;

    /// Apply every leg all-or-nothing. Legs are applied in order, so a row may
    /// appear more than once.
    fn apply_deltas(&self, batch: Vec<StockDelta>) -> Result<Vec<AppliedDelta>, StoreError>;

    /// Apply one delta together with its movement.
    ///
    /// `InsufficientStock` if the quantity would go negative; the stored
    /// quantity and the ledger are left unchanged.
    fn apply_delta(&self, delta: StockDelta) -> Result<AppliedDelta, StoreError> {
        self.apply_deltas(vec![delta])?
            .pop()
            .ok_or_else(|| StoreError::Storage("commit returned no applied delta".to_string()))
    }

    /// Remove a row that no movement references (`Conflict` otherwise).
    fn delete(&self, stock_id: StockId) -> Result<(), StoreError>;
}

/// Append-only audit log of accepted stock changes.
///
/// Queries return newest first (`occurred_at` descending, then id descending).
/// There is deliberately no update or delete.
pub trait MovementLedger: Send + Sync {
    /// Append a standalone entry. `InvalidArgument` if `quantity <= 0`,
    /// `NotFound` if the stock row does not exist.
    fn append(&self, movement: NewMovement) -> Result<MovementRecord, StoreError>;

    fn movement(&self, movement_id: MovementId) -> Result<Option<MovementRecord>, StoreError>;

    fn for_stock(&self, stock_id: StockId) -> Result<Vec<MovementRecord>, StoreError>;

    fn last_n_for_order(&self, order_id: OrderId, n: usize) -> Result<Vec<MovementRecord>, StoreError>;

    fn all_for_shipment(&self, shipment_id: ShipmentId) -> Result<Vec<MovementRecord>, StoreError>;

    /// Entries with `occurred_at >= since`.
    fn since(&self, since: DateTime<Utc>) -> Result<Vec<MovementRecord>, StoreError>;

    fn count_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// A backend that holds both stock rows and their ledger, usable as one
/// trait object.
pub trait StockBackend: StockStore + MovementLedger {}

impl<T> StockBackend for T where T: StockStore + MovementLedger + ?Sized {}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn get(&self, stock_id: StockId) -> Result<StockRecord, StoreError> {
        (**self).get(stock_id)
    }

    fn find(
        &self,
        resource_id: ResourceId,
        warehouse_id: WarehouseId,
    ) -> Result<Option<StockRecord>, StoreError> {
        (**self).find(resource_id, warehouse_id)
    }

    fn create(
        &self,
        resource_id: ResourceId,
        warehouse_id: WarehouseId,
        initial_quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<StockRecord, StoreError> {
        (**self).create(resource_id, warehouse_id, initial_quantity, occurred_at)
    }

    fn list_for_resource(&self, resource_id: ResourceId) -> Result<Vec<StockRecord>, StoreError> {
        (**self).list_for_resource(resource_id)
    }

    fn list_all(&self) -> Result<Vec<StockRecord>, StoreError> {
        (**self).list_all()
    }

    fn apply_deltas(&self, batch: Vec<StockDelta>) -> Result<Vec<AppliedDelta>, StoreError> {
        (**self).apply_deltas(batch)
    }

    fn delete(&self, stock_id: StockId) -> Result<(), StoreError> {
        (**self).delete(stock_id)
    }
}

impl<S> MovementLedger for Arc<S>
where
    S: MovementLedger + ?Sized,
{
    fn append(&self, movement: NewMovement) -> Result<MovementRecord, StoreError> {
        (**self).append(movement)
    }

    fn movement(&self, movement_id: MovementId) -> Result<Option<MovementRecord>, StoreError> {
        (**self).movement(movement_id)
    }

    fn for_stock(&self, stock_id: StockId) -> Result<Vec<MovementRecord>, StoreError> {
        (**self).for_stock(stock_id)
    }

    fn last_n_for_order(&self, order_id: OrderId, n: usize) -> Result<Vec<MovementRecord>, StoreError> {
        (**self).last_n_for_order(order_id, n)
    }

    fn all_for_shipment(&self, shipment_id: ShipmentId) -> Result<Vec<MovementRecord>, StoreError> {
        (**self).all_for_shipment(shipment_id)
    }

    fn since(&self, since: DateTime<Utc>) -> Result<Vec<MovementRecord>, StoreError> {
        (**self).since(since)
    }

    fn count_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        (**self).count_since(since)
    }
}

/// Validate a batch and return the distinct row ids it touches, sorted.
///
/// Sorted ids give every backend the same lock acquisition order.
pub(crate) fn batch_stock_ids(batch: &[StockDelta]) -> Result<Vec<StockId>, StoreError> {
    if batch.is_empty() {
        return Err(DomainError::invalid_argument("stock commit needs at least one delta").into());
    }
    for leg in batch {
        leg.validate()?;
    }

    let mut ids: Vec<StockId> = batch.iter().map(StockDelta::stock_id).collect();
    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// Run a batch against locked copies of its rows.
///
/// Nothing is written here: `rows` is updated in place only when every leg is
/// accepted, and the caller persists the returned state.
pub(crate) fn plan_batch(
    rows: &mut HashMap<StockId, StockRecord>,
    batch: Vec<StockDelta>,
) -> Result<Vec<AppliedDelta>, StoreError> {
    let mut working = rows.clone();
    let mut applied = Vec::with_capacity(batch.len());

    for leg in batch {
        let stock_id = leg.stock_id();
        let current = working
            .get(&stock_id)
            .ok_or_else(|| DomainError::not_found("stock", stock_id))?;

        leg.expected_version
            .check(current.version())
            .map_err(|e| StoreError::Concurrency(e.to_string()))?;

        let next = current.apply_delta(leg.delta)?;
        let movement = leg.movement.into_record(MovementId::new())?;

        working.insert(stock_id, next.clone());
        applied.push(AppliedDelta {
            stock: next,
            movement,
        });
    }

    *rows = working;
    Ok(applied)
}
