use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use stockledger_core::{
    DomainError, MovementId, OrderId, ResourceId, ShipmentId, StockId, WarehouseId,
};
use stockledger_inventory::{sort_newest_first, MovementKind, MovementRecord, NewMovement, StockRecord};

use super::r#trait::{batch_stock_ids, plan_batch, AppliedDelta, MovementLedger, StockDelta, StockStore, StoreError};

/// A stock row together with the movements it owns.
#[derive(Debug)]
struct StockRow {
    record: StockRecord,
    movements: Vec<MovementRecord>,
    /// Set under the row lock when the row is removed, so a writer that looked
    /// the row up just before removal cannot commit into it.
    deleted: bool,
}

type SharedRow = Arc<RwLock<StockRow>>;

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<StockId, SharedRow>,
    by_pair: HashMap<(ResourceId, WarehouseId), StockId>,
}

/// In-memory stock store and movement ledger.
///
/// Intended for tests/dev. The table lock is only held to look rows up; all
/// reads and writes of a row happen under that row's own lock, so adjustments
/// of different rows run in parallel.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    tables: RwLock<Tables>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("lock poisoned".to_string())
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn row(&self, stock_id: StockId) -> Result<SharedRow, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        tables
            .rows
            .get(&stock_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("stock", stock_id).into())
    }

    /// Every row handle, sorted by id.
    fn all_rows(&self) -> Result<Vec<(StockId, SharedRow)>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut rows: Vec<(StockId, SharedRow)> = tables
            .rows
            .iter()
            .map(|(id, row)| (*id, Arc::clone(row)))
            .collect();
        rows.sort_by_key(|(id, _)| *id);
        Ok(rows)
    }

    /// Run `read` over every live row with all row read locks held at once.
    ///
    /// Locks are taken in id order, the order `apply_deltas` uses, so a
    /// multi-row batch is seen either entirely or not at all.
    fn read_snapshot<T>(&self, read: impl FnOnce(&[&StockRow]) -> T) -> Result<T, StoreError> {
        let rows = self.all_rows()?;
        let guards = rows
            .iter()
            .map(|(_, row)| row.read().map_err(poisoned))
            .collect::<Result<Vec<_>, _>>()?;
        let live: Vec<&StockRow> = guards.iter().map(|guard| &**guard).filter(|row| !row.deleted).collect();
        Ok(read(&live))
    }

    fn collect_movements(
        &self,
        mut keep: impl FnMut(&MovementRecord) -> bool,
    ) -> Result<Vec<MovementRecord>, StoreError> {
        let mut out = self.read_snapshot(|rows| {
            rows.iter()
                .flat_map(|row| row.movements.iter())
                .filter(|m| keep(m))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        sort_newest_first(&mut out);
        Ok(out)
    }
}

impl StockStore for InMemoryStockStore {
    fn get(&self, stock_id: StockId) -> Result<StockRecord, StoreError> {
        let row = self.row(stock_id)?;
        let row = row.read().map_err(poisoned)?;
        if row.deleted {
            return Err(DomainError::not_found("stock", stock_id).into());
        }
        Ok(row.record.clone())
    }

    fn find(
        &self,
        resource_id: ResourceId,
        warehouse_id: WarehouseId,
    ) -> Result<Option<StockRecord>, StoreError> {
        let stock_id = {
            let tables = self.tables.read().map_err(poisoned)?;
            match tables.by_pair.get(&(resource_id, warehouse_id)) {
                Some(id) => *id,
                None => return Ok(None),
            }
        };

        match self.get(stock_id) {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::Domain(DomainError::NotFound { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create(
        &self,
        resource_id: ResourceId,
        warehouse_id: WarehouseId,
        initial_quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<StockRecord, StoreError> {
        let record = StockRecord::create(StockId::new(), resource_id, warehouse_id, initial_quantity)?;
        let stock_id = record.id_typed();

        let mut movements = Vec::new();
        if initial_quantity > 0 {
            let entry = NewMovement::new(stock_id, MovementKind::Entry, initial_quantity, occurred_at)
                .into_record(MovementId::new())?;
            movements.push(entry);
        }

        let mut tables = self.tables.write().map_err(poisoned)?;
        if tables.by_pair.contains_key(&(resource_id, warehouse_id)) {
            return Err(DomainError::conflict(format!(
                "resource {resource_id} is already stocked in warehouse {warehouse_id}"
            ))
            .into());
        }

        tables.by_pair.insert((resource_id, warehouse_id), stock_id);
        tables.rows.insert(
            stock_id,
            Arc::new(RwLock::new(StockRow {
                record: record.clone(),
                movements,
                deleted: false,
            })),
        );

        Ok(record)
    }

    fn list_for_resource(&self, resource_id: ResourceId) -> Result<Vec<StockRecord>, StoreError> {
        let mut out: Vec<StockRecord> = self
            .list_all()?
            .into_iter()
            .filter(|s| s.resource_id() == resource_id)
            .collect();
        out.sort_by_key(|s| s.warehouse_id());
        Ok(out)
    }

    fn list_all(&self) -> Result<Vec<StockRecord>, StoreError> {
        // Rows come back in id order already.
        self.read_snapshot(|rows| rows.iter().map(|row| row.record.clone()).collect())
    }

    fn apply_deltas(&self, batch: Vec<StockDelta>) -> Result<Vec<AppliedDelta>, StoreError> {
        let ids = batch_stock_ids(&batch)?;

        let shared = ids
            .iter()
            .map(|id| self.row(*id).map(|row| (*id, row)))
            .collect::<Result<Vec<_>, _>>()?;

        // Lock in id order; every writer does the same, so no deadlock.
        let mut guards: Vec<(StockId, RwLockWriteGuard<'_, StockRow>)> = Vec::with_capacity(shared.len());
        for (id, row) in &shared {
            let guard = row.write().map_err(poisoned)?;
            if guard.deleted {
                return Err(DomainError::not_found("stock", id).into());
            }
            guards.push((*id, guard));
        }

        let mut working: HashMap<StockId, StockRecord> = guards
            .iter()
            .map(|(id, guard)| (*id, guard.record.clone()))
            .collect();

        let applied = plan_batch(&mut working, batch)?;

        // Every leg was accepted: publish all state before any guard drops.
        for (id, guard) in guards.iter_mut() {
            if let Some(record) = working.remove(&*id) {
                guard.record = record;
            }
        }
        for leg in &applied {
            let stock_id = leg.stock.id_typed();
            if let Some((_, guard)) = guards.iter_mut().find(|(id, _)| *id == stock_id) {
                guard.movements.push(leg.movement.clone());
            }
        }

        Ok(applied)
    }

    fn delete(&self, stock_id: StockId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let row = tables
            .rows
            .get(&stock_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("stock", stock_id))?;

        let mut row = row.write().map_err(poisoned)?;
        if !row.movements.is_empty() {
            return Err(DomainError::conflict(format!(
                "stock {stock_id} has {} movement(s) and cannot be deleted",
                row.movements.len()
            ))
            .into());
        }

        row.deleted = true;
        let pair = (row.record.resource_id(), row.record.warehouse_id());
        tables.rows.remove(&stock_id);
        tables.by_pair.remove(&pair);
        Ok(())
    }
}

impl MovementLedger for InMemoryStockStore {
    fn append(&self, movement: NewMovement) -> Result<MovementRecord, StoreError> {
        movement.validate()?;
        let row = self.row(movement.stock_id)?;
        let mut row = row.write().map_err(poisoned)?;
        if row.deleted {
            return Err(DomainError::not_found("stock", movement.stock_id).into());
        }

        let record = movement.into_record(MovementId::new())?;
        row.movements.push(record.clone());
        Ok(record)
    }

    fn movement(&self, movement_id: MovementId) -> Result<Option<MovementRecord>, StoreError> {
        Ok(self
            .collect_movements(|m| m.id == movement_id)?
            .into_iter()
            .next())
    }

    fn for_stock(&self, stock_id: StockId) -> Result<Vec<MovementRecord>, StoreError> {
        let row = self.row(stock_id)?;
        let row = row.read().map_err(poisoned)?;
        let mut out = row.movements.clone();
        sort_newest_first(&mut out);
        Ok(out)
    }

    fn last_n_for_order(&self, order_id: OrderId, n: usize) -> Result<Vec<MovementRecord>, StoreError> {
        let mut out = self.collect_movements(|m| m.order_id == Some(order_id))?;
        out.truncate(n);
        Ok(out)
    }

    fn all_for_shipment(&self, shipment_id: ShipmentId) -> Result<Vec<MovementRecord>, StoreError> {
        self.collect_movements(|m| m.shipment_id == Some(shipment_id))
    }

    fn since(&self, since: DateTime<Utc>) -> Result<Vec<MovementRecord>, StoreError> {
        self.collect_movements(|m| m.occurred_at >= since)
    }

    fn count_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        self.read_snapshot(|rows| {
            rows.iter()
                .flat_map(|row| row.movements.iter())
                .filter(|m| m.occurred_at >= since)
                .count() as u64
        })
    }
}
