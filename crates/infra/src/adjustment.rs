//! Stock adjustment pipeline (the only write path for quantities).
//!
//! ```text
//! command (AdjustStock / TransferStock / ShipmentDelivery)
//!   ↓
//! 1. Validate and resolve movement kinds (pure)
//!   ↓
//! 2. Commit every (delta, movement) leg as one unit through the store
//!   ↓
//! 3. Retry transient aborts; anything else is returned as-is
//! ```
//!
//! A rejected leg (insufficient stock, unknown row, stale version) rejects the
//! whole command and nothing reaches the ledger.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use stockledger_core::{DomainError, ResourceId, StockId, WarehouseId};
use stockledger_inventory::{AdjustStock, ShipmentDelivery, StockRecord, TransferStock};

use crate::catalog::ReferenceCatalog;
use crate::config::{InventoryConfig, DEFAULT_MAX_COMMIT_RETRIES};
use crate::error::InventoryError;
use crate::store::{AppliedDelta, StockDelta, StockStore, StoreError};

#[derive(Debug)]
pub struct StockAdjustmentService<S, C> {
    store: S,
    catalog: C,
    max_commit_retries: u32,
}

impl<S, C> StockAdjustmentService<S, C> {
    pub fn new(store: S, catalog: C) -> Self {
        Self {
            store,
            catalog,
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
        }
    }

    pub fn from_config(store: S, catalog: C, config: &InventoryConfig) -> Self {
        Self::new(store, catalog).with_max_commit_retries(config.max_commit_retries)
    }

    pub fn with_max_commit_retries(mut self, retries: u32) -> Self {
        self.max_commit_retries = retries;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, C> StockAdjustmentService<S, C>
where
    S: StockStore,
    C: ReferenceCatalog,
{
    /// First stocking of a resource in a warehouse.
    ///
    /// Both ids must be known to the reference catalog.
    #[instrument(skip(self), fields(resource_id = %resource_id, warehouse_id = %warehouse_id))]
    pub fn create_stock(
        &self,
        resource_id: ResourceId,
        warehouse_id: WarehouseId,
        initial_quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<StockRecord, InventoryError> {
        if !self.catalog.resource_exists(resource_id)? {
            return Err(DomainError::not_found("resource", resource_id).into());
        }
        if !self.catalog.warehouse_exists(warehouse_id)? {
            return Err(DomainError::not_found("warehouse", warehouse_id).into());
        }

        let stock = self
            .store
            .create(resource_id, warehouse_id, initial_quantity, occurred_at)
            .map_err(|e| self.report("create_stock", 1, e))?;

        info!(stock_id = %stock.id_typed(), quantity = stock.quantity(), "stock created");
        Ok(stock)
    }

    /// Apply one signed delta and record its movement.
    #[instrument(skip(self, cmd), fields(stock_id = %cmd.stock_id, delta = cmd.delta))]
    pub fn adjust(&self, cmd: AdjustStock) -> Result<StockRecord, InventoryError> {
        let leg = StockDelta::from_adjustment(&cmd).inspect_err(|e| {
            debug!(error = %e, "adjustment rejected");
        })?;

        let applied = self.commit("adjust", vec![leg])?;
        let AppliedDelta { stock, movement } = single(applied)?;

        info!(
            stock_id = %stock.id_typed(),
            movement_id = %movement.id,
            kind = %movement.kind,
            quantity = stock.quantity(),
            "stock adjusted"
        );
        Ok(stock)
    }

    /// Move units between two stocks of the same resource.
    ///
    /// Returns the source and destination rows after the move.
    #[instrument(
        skip(self, cmd),
        fields(from = %cmd.from_stock, to = %cmd.to_stock, quantity = cmd.quantity)
    )]
    pub fn transfer(&self, cmd: TransferStock) -> Result<(StockRecord, StockRecord), InventoryError> {
        let [exit, entry] = cmd.legs()?;

        let from = self.store.get(cmd.from_stock)?;
        let to = self.store.get(cmd.to_stock)?;
        if from.resource_id() != to.resource_id() {
            return Err(DomainError::invalid_argument(format!(
                "cannot transfer between stocks of different resources ({} -> {})",
                from.resource_id(),
                to.resource_id()
            ))
            .into());
        }

        let batch = vec![
            StockDelta::from_adjustment(&exit)?,
            StockDelta::from_adjustment(&entry)?,
        ];
        let mut applied = self.commit("transfer", batch)?.into_iter();

        match (applied.next(), applied.next()) {
            (Some(source), Some(destination)) => {
                info!(
                    from_quantity = source.stock.quantity(),
                    to_quantity = destination.stock.quantity(),
                    "stock transferred"
                );
                Ok((source.stock, destination.stock))
            }
            _ => Err(InventoryError::Consistency(
                "transfer commit returned fewer than two legs".to_string(),
            )),
        }
    }

    /// Consume every order line of a delivered shipment from its warehouse.
    ///
    /// All lines commit together. A line whose resource is not stocked in the
    /// warehouse counts as zero available.
    #[instrument(
        skip(self, delivery),
        fields(shipment_id = %delivery.shipment_id, order_id = %delivery.order_id, lines = delivery.lines.len())
    )]
    pub fn fulfill_shipment(&self, delivery: ShipmentDelivery) -> Result<Vec<StockRecord>, InventoryError> {
        delivery.validate()?;

        let mut batch = Vec::with_capacity(delivery.lines.len());
        for line in &delivery.lines {
            let Some(stock) = self.store.find(line.resource_id, delivery.warehouse_id)? else {
                debug!(resource_id = %line.resource_id, "resource not stocked in shipment warehouse");
                return Err(InventoryError::InsufficientStock {
                    available: 0,
                    requested: line.quantity.unsigned_abs(),
                });
            };
            batch.push(StockDelta::from_adjustment(&delivery.exit_for(stock.id_typed(), line))?);
        }

        let applied = self.commit("fulfill_shipment", batch)?;
        info!(movements = applied.len(), "shipment fulfilled");
        Ok(applied.into_iter().map(|leg| leg.stock).collect())
    }

    /// Remove a stock row that has never moved.
    #[instrument(skip(self), fields(stock_id = %stock_id))]
    pub fn delete_stock(&self, stock_id: StockId) -> Result<(), InventoryError> {
        self.store
            .delete(stock_id)
            .map_err(|e| self.report("delete_stock", 1, e))?;
        info!("stock deleted");
        Ok(())
    }

    fn commit(&self, operation: &'static str, batch: Vec<StockDelta>) -> Result<Vec<AppliedDelta>, InventoryError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.store.apply_deltas(batch.clone()) {
                Ok(applied) => return Ok(applied),
                Err(e) if e.is_transient() && attempt <= self.max_commit_retries => {
                    warn!(operation, attempt, error = %e, "transient commit failure, retrying");
                }
                Err(e) => return Err(self.report(operation, attempt, e)),
            }
        }
    }

    /// Log a store failure at the level its category deserves and convert it.
    fn report(&self, operation: &'static str, attempts: u32, err: StoreError) -> InventoryError {
        match &err {
            StoreError::Transient(_) | StoreError::Storage(_) => {
                error!(operation, attempts, error = %err, "stock ledger commit failed");
            }
            StoreError::Domain(_) | StoreError::Concurrency(_) => {
                debug!(operation, error = %err, "stock change rejected");
            }
        }
        err.into()
    }
}

fn single(applied: Vec<AppliedDelta>) -> Result<AppliedDelta, InventoryError> {
    applied
        .into_iter()
        .next()
        .ok_or_else(|| InventoryError::Consistency("commit returned no applied delta".to_string()))
}
