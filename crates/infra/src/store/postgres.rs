//! Postgres-backed stock store and movement ledger.
//!
//! Quantities live in `stocks`, the audit trail in `movements`. Every write
//! path runs in one transaction, so a quantity change and its movement commit
//! together or not at all.
//!
//! ## Error Mapping
//!
//! | PostgreSQL code | StoreError | Scenario |
//! |-----------------|------------|----------|
//! | `23505` | `Domain(Conflict)` | (resource, warehouse) pair already stocked |
//! | `23503` | `Domain(Conflict)` / `Domain(NotFound)` | delete of a referenced stock / append to a missing stock |
//! | `23514` | `Domain(InvalidArgument)` | check constraint (negative quantity, kind) |
//! | `40001`, `40P01` | `Transient` | serialization failure, deadlock; retry the unit of work |
//! | other / pool / IO | `Storage` | rolled back, not retried |
//!
//! ## Locking
//!
//! `apply_deltas` locks the batch's rows with `SELECT ... FOR UPDATE` ordered
//! by id, the same order every batch uses. Batches over disjoint rows do not
//! wait for each other.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tokio::runtime::RuntimeFlavor;
use tracing::{debug, instrument};
use uuid::Uuid;

use stockledger_core::{
    AggregateRoot, DomainError, MovementId, OrderId, ResourceId, ShipmentId, StockId, WarehouseId,
};
use stockledger_inventory::{MovementKind, MovementRecord, NewMovement, StockRecord};

use super::r#trait::{batch_stock_ids, plan_batch, AppliedDelta, MovementLedger, StockDelta, StockStore, StoreError};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stocks (
        id UUID PRIMARY KEY,
        resource_id UUID NOT NULL,
        warehouse_id UUID NOT NULL,
        quantity BIGINT NOT NULL CHECK (quantity >= 0),
        version BIGINT NOT NULL DEFAULT 0,
        UNIQUE (resource_id, warehouse_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS movements (
        id UUID PRIMARY KEY,
        stock_id UUID NOT NULL REFERENCES stocks (id),
        kind TEXT NOT NULL CHECK (kind IN ('ENTRY', 'EXIT', 'TRANSFER')),
        quantity BIGINT NOT NULL CHECK (quantity > 0),
        occurred_at TIMESTAMPTZ NOT NULL,
        order_id UUID NULL,
        shipment_id UUID NULL,
        reason VARCHAR(200) NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS movements_stock_idx ON movements (stock_id, occurred_at DESC)",
    "CREATE INDEX IF NOT EXISTS movements_order_idx ON movements (order_id, occurred_at DESC) WHERE order_id IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS movements_shipment_idx ON movements (shipment_id) WHERE shipment_id IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS movements_occurred_idx ON movements (occurred_at DESC)",
];

const MOVEMENT_COLUMNS: &str =
    "id, stock_id, kind, quantity, occurred_at, order_id, shipment_id, reason";

/// Optional filters for ledger reads; `None` means "don't filter".
#[derive(Debug, Default, Clone, Copy)]
struct MovementFilter {
    stock_id: Option<StockId>,
    order_id: Option<OrderId>,
    shipment_id: Option<ShipmentId>,
    since: Option<DateTime<Utc>>,
    limit: Option<usize>,
}

/// Postgres implementation of [`StockStore`] and [`MovementLedger`].
///
/// The traits are synchronous; the trait impls drive the async methods on the
/// current tokio runtime, which must be multi-threaded.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: Arc<PgPool>,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect to `database_url` with a pool of at most `max_connections`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(stock_id = %stock_id), err)]
    pub async fn load_stock(&self, stock_id: StockId) -> Result<StockRecord, StoreError> {
        let row = sqlx::query(
            "SELECT id, resource_id, warehouse_id, quantity, version FROM stocks WHERE id = $1",
        )
        .bind(stock_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stock", e))?;

        match row {
            Some(row) => StockRow::decode(&row)?.into_record(),
            None => Err(DomainError::not_found("stock", stock_id).into()),
        }
    }

    #[instrument(skip(self), fields(resource_id = %resource_id, warehouse_id = %warehouse_id), err)]
    pub async fn find_stock(
        &self,
        resource_id: ResourceId,
        warehouse_id: WarehouseId,
    ) -> Result<Option<StockRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, resource_id, warehouse_id, quantity, version
            FROM stocks
            WHERE resource_id = $1 AND warehouse_id = $2
            "#,
        )
        .bind(resource_id.as_uuid())
        .bind(warehouse_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_stock", e))?;

        row.map(|row| StockRow::decode(&row)?.into_record()).transpose()
    }

    #[instrument(
        skip(self),
        fields(resource_id = %resource_id, warehouse_id = %warehouse_id),
        err
    )]
    pub async fn create_stock(
        &self,
        resource_id: ResourceId,
        warehouse_id: WarehouseId,
        initial_quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<StockRecord, StoreError> {
        let record = StockRecord::create(StockId::new(), resource_id, warehouse_id, initial_quantity)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO stocks (id, resource_id, warehouse_id, quantity, version)
            VALUES ($1, $2, $3, $4, 0)
            "#,
        )
        .bind(record.id_typed().as_uuid())
        .bind(resource_id.as_uuid())
        .bind(warehouse_id.as_uuid())
        .bind(initial_quantity)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if has_code(&e, "23505") {
                StoreError::from(DomainError::conflict(format!(
                    "resource {resource_id} is already stocked in warehouse {warehouse_id}"
                )))
            } else {
                map_sqlx_error("insert_stock", e)
            }
        })?;

        if initial_quantity > 0 {
            let entry = NewMovement::new(record.id_typed(), MovementKind::Entry, initial_quantity, occurred_at)
                .into_record(MovementId::new())?;
            insert_movement(&mut tx, &entry).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(record)
    }

    /// All rows, or only those of `resource_id`.
    #[instrument(skip(self), err)]
    pub async fn list_stocks(&self, resource_id: Option<ResourceId>) -> Result<Vec<StockRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, resource_id, warehouse_id, quantity, version
            FROM stocks
            WHERE ($1::uuid IS NULL OR resource_id = $1)
            ORDER BY id
            "#,
        )
        .bind(resource_id.map(|id| *id.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_stocks", e))?;

        rows.iter()
            .map(|row| StockRow::decode(row)?.into_record())
            .collect()
    }

    /// Lock, plan, and persist a batch in one transaction.
    #[instrument(skip(self, batch), fields(legs = batch.len()), err)]
    pub async fn commit_deltas(&self, batch: Vec<StockDelta>) -> Result<Vec<AppliedDelta>, StoreError> {
        let ids = batch_stock_ids(&batch)?;
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let rows = sqlx::query(
            r#"
            SELECT id, resource_id, warehouse_id, quantity, version
            FROM stocks
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(uuids.as_slice())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_stocks", e))?;

        let mut locked = HashMap::with_capacity(rows.len());
        for row in &rows {
            let record = StockRow::decode(row)?.into_record()?;
            locked.insert(record.id_typed(), record);
        }

        let applied = match plan_batch(&mut locked, batch) {
            Ok(applied) => applied,
            Err(e) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                debug!(error = %e, "stock batch rejected");
                return Err(e);
            }
        };

        for record in locked.values() {
            sqlx::query("UPDATE stocks SET quantity = $2, version = $3 WHERE id = $1")
                .bind(record.id_typed().as_uuid())
                .bind(to_db(record.quantity(), "quantity")?)
                .bind(to_db(record.version(), "version")?)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("update_stock", e))?;
        }

        for leg in &applied {
            insert_movement(&mut tx, &leg.movement).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(applied)
    }

    #[instrument(skip(self), fields(stock_id = %stock_id), err)]
    pub async fn delete_stock(&self, stock_id: StockId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM stocks WHERE id = $1")
            .bind(stock_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if has_code(&e, "23503") {
                    StoreError::from(DomainError::conflict(format!(
                        "stock {stock_id} has movements and cannot be deleted"
                    )))
                } else {
                    map_sqlx_error("delete_stock", e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("stock", stock_id).into());
        }
        Ok(())
    }

    #[instrument(skip(self, movement), fields(stock_id = %movement.stock_id, kind = %movement.kind), err)]
    pub async fn append_movement(&self, movement: NewMovement) -> Result<MovementRecord, StoreError> {
        let stock_id = movement.stock_id;
        let record = movement.into_record(MovementId::new())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        insert_movement(&mut tx, &record).await.map_err(|e| match e {
            StoreError::Domain(DomainError::Conflict(_)) => DomainError::not_found("stock", stock_id).into(),
            other => other,
        })?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(record)
    }

    #[instrument(skip(self), fields(movement_id = %movement_id), err)]
    pub async fn load_movement(&self, movement_id: MovementId) -> Result<Option<MovementRecord>, StoreError> {
        let row = sqlx::query(&format!("SELECT {MOVEMENT_COLUMNS} FROM movements WHERE id = $1"))
            .bind(movement_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_movement", e))?;

        row.map(|row| LedgerRow::decode(&row)?.into_record()).transpose()
    }

    #[instrument(skip(self), err)]
    async fn query_movements(&self, filter: MovementFilter) -> Result<Vec<MovementRecord>, StoreError> {
        let limit = filter
            .limit
            .map(|n| i64::try_from(n).unwrap_or(i64::MAX));

        let rows = sqlx::query(&format!(
            r#"
            SELECT {MOVEMENT_COLUMNS}
            FROM movements
            WHERE ($1::uuid IS NULL OR stock_id = $1)
                AND ($2::uuid IS NULL OR order_id = $2)
                AND ($3::uuid IS NULL OR shipment_id = $3)
                AND ($4::timestamptz IS NULL OR occurred_at >= $4)
            ORDER BY occurred_at DESC, id DESC
            LIMIT $5
            "#
        ))
        .bind(filter.stock_id.map(|id| *id.as_uuid()))
        .bind(filter.order_id.map(|id| *id.as_uuid()))
        .bind(filter.shipment_id.map(|id| *id.as_uuid()))
        .bind(filter.since)
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_movements", e))?;

        rows.iter()
            .map(|row| LedgerRow::decode(row)?.into_record())
            .collect()
    }

    #[instrument(skip(self), err)]
    pub async fn count_movements_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM movements WHERE occurred_at >= $1")
            .bind(since)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_movements_since", e))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| StoreError::Storage(format!("failed to read count: {e}")))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    fn run<T>(&self, fut: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        block_on_current(fut)
    }
}

/// Run an async store operation to completion from synchronous code.
fn block_on_current<T>(fut: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        StoreError::Storage(
            "PostgresStockStore requires a tokio runtime; call it from within a multi-threaded runtime"
                .to_string(),
        )
    })?;
    if handle.runtime_flavor() != RuntimeFlavor::MultiThread {
        return Err(StoreError::Storage(format!(
            "PostgresStockStore cannot block on a {:?} tokio runtime; use a multi-threaded runtime",
            handle.runtime_flavor()
        )));
    }
    tokio::task::block_in_place(|| handle.block_on(fut))
}

async fn insert_movement(
    tx: &mut Transaction<'_, Postgres>,
    movement: &MovementRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO movements (id, stock_id, kind, quantity, occurred_at, order_id, shipment_id, reason)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(movement.id.as_uuid())
    .bind(movement.stock_id.as_uuid())
    .bind(movement.kind.as_str())
    .bind(to_db(movement.quantity, "movement quantity")?)
    .bind(movement.occurred_at)
    .bind(movement.order_id.map(|id| *id.as_uuid()))
    .bind(movement.shipment_id.map(|id| *id.as_uuid()))
    .bind(movement.reason.as_deref())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;
    Ok(())
}

fn to_db(value: u64, what: &str) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::from(DomainError::invalid_argument(format!("{what} {value} exceeds the storable range"))))
}

fn has_code(err: &sqlx::Error, code: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(c) = db_err.code() {
            return c.as_ref() == code;
        }
    }
    false
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") => DomainError::conflict(msg).into(),
                Some("23514") => DomainError::invalid_argument(msg).into(),
                Some("40001") | Some("40P01") => StoreError::Transient(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Transient(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => StoreError::Storage(format!("connection pool closed in {operation}")),
        sqlx::Error::RowNotFound => StoreError::Storage(format!("unexpected row not found in {operation}")),
        _ => StoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct StockRow {
    id: Uuid,
    resource_id: Uuid,
    warehouse_id: Uuid,
    quantity: i64,
    version: i64,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for StockRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StockRow {
            id: row.try_get("id")?,
            resource_id: row.try_get("resource_id")?,
            warehouse_id: row.try_get("warehouse_id")?,
            quantity: row.try_get("quantity")?,
            version: row.try_get("version")?,
        })
    }
}

impl StockRow {
    fn decode(row: &sqlx::postgres::PgRow) -> Result<Self, StoreError> {
        StockRow::from_row(row).map_err(|e| StoreError::Storage(format!("failed to decode stock row: {e}")))
    }

    fn into_record(self) -> Result<StockRecord, StoreError> {
        let quantity = u64::try_from(self.quantity)
            .map_err(|_| StoreError::Storage(format!("stock {} has negative quantity {}", self.id, self.quantity)))?;
        let version = u64::try_from(self.version)
            .map_err(|_| StoreError::Storage(format!("stock {} has negative version {}", self.id, self.version)))?;
        Ok(StockRecord::restore(
            StockId::from_uuid(self.id),
            ResourceId::from_uuid(self.resource_id),
            WarehouseId::from_uuid(self.warehouse_id),
            quantity,
            version,
        ))
    }
}

#[derive(Debug)]
struct LedgerRow {
    id: Uuid,
    stock_id: Uuid,
    kind: String,
    quantity: i64,
    occurred_at: DateTime<Utc>,
    order_id: Option<Uuid>,
    shipment_id: Option<Uuid>,
    reason: Option<String>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for LedgerRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(LedgerRow {
            id: row.try_get("id")?,
            stock_id: row.try_get("stock_id")?,
            kind: row.try_get("kind")?,
            quantity: row.try_get("quantity")?,
            occurred_at: row.try_get("occurred_at")?,
            order_id: row.try_get("order_id")?,
            shipment_id: row.try_get("shipment_id")?,
            reason: row.try_get("reason")?,
        })
    }
}

impl LedgerRow {
    fn decode(row: &sqlx::postgres::PgRow) -> Result<Self, StoreError> {
        LedgerRow::from_row(row).map_err(|e| StoreError::Storage(format!("failed to decode movement row: {e}")))
    }

    fn into_record(self) -> Result<MovementRecord, StoreError> {
        let kind: MovementKind = self
            .kind
            .parse()
            .map_err(|e| StoreError::Storage(format!("movement {}: {e}", self.id)))?;
        let quantity = u64::try_from(self.quantity)
            .map_err(|_| StoreError::Storage(format!("movement {} has quantity {}", self.id, self.quantity)))?;

        Ok(MovementRecord {
            id: MovementId::from_uuid(self.id),
            stock_id: StockId::from_uuid(self.stock_id),
            kind,
            quantity,
            occurred_at: self.occurred_at,
            order_id: self.order_id.map(OrderId::from_uuid),
            shipment_id: self.shipment_id.map(ShipmentId::from_uuid),
            reason: self.reason,
        })
    }
}

impl StockStore for PostgresStockStore {
    fn get(&self, stock_id: StockId) -> Result<StockRecord, StoreError> {
        self.run(self.load_stock(stock_id))
    }

    fn find(
        &self,
        resource_id: ResourceId,
        warehouse_id: WarehouseId,
    ) -> Result<Option<StockRecord>, StoreError> {
        self.run(self.find_stock(resource_id, warehouse_id))
    }

    fn create(
        &self,
        resource_id: ResourceId,
        warehouse_id: WarehouseId,
        initial_quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<StockRecord, StoreError> {
        self.run(self.create_stock(resource_id, warehouse_id, initial_quantity, occurred_at))
    }

    fn list_for_resource(&self, resource_id: ResourceId) -> Result<Vec<StockRecord>, StoreError> {
        let mut out = self.run(self.list_stocks(Some(resource_id)))?;
        out.sort_by_key(|s| s.warehouse_id());
        Ok(out)
    }

    fn list_all(&self) -> Result<Vec<StockRecord>, StoreError> {
        self.run(self.list_stocks(None))
    }

    fn apply_deltas(&self, batch: Vec<StockDelta>) -> Result<Vec<AppliedDelta>, StoreError> {
        self.run(self.commit_deltas(batch))
    }

    fn delete(&self, stock_id: StockId) -> Result<(), StoreError> {
        self.run(self.delete_stock(stock_id))
    }
}

impl MovementLedger for PostgresStockStore {
    fn append(&self, movement: NewMovement) -> Result<MovementRecord, StoreError> {
        self.run(self.append_movement(movement))
    }

    fn movement(&self, movement_id: MovementId) -> Result<Option<MovementRecord>, StoreError> {
        self.run(self.load_movement(movement_id))
    }

    fn for_stock(&self, stock_id: StockId) -> Result<Vec<MovementRecord>, StoreError> {
        self.run(async {
            self.load_stock(stock_id).await?;
            self.query_movements(MovementFilter {
                stock_id: Some(stock_id),
                ..Default::default()
            })
            .await
        })
    }

    fn last_n_for_order(&self, order_id: OrderId, n: usize) -> Result<Vec<MovementRecord>, StoreError> {
        self.run(self.query_movements(MovementFilter {
            order_id: Some(order_id),
            limit: Some(n),
            ..Default::default()
        }))
    }

    fn all_for_shipment(&self, shipment_id: ShipmentId) -> Result<Vec<MovementRecord>, StoreError> {
        self.run(self.query_movements(MovementFilter {
            shipment_id: Some(shipment_id),
            ..Default::default()
        }))
    }

    fn since(&self, since: DateTime<Utc>) -> Result<Vec<MovementRecord>, StoreError> {
        self.run(self.query_movements(MovementFilter {
            since: Some(since),
            ..Default::default()
        }))
    }

    fn count_since(&self, since: DateTime<Utc>) -> Result<u64, StoreError> {
        self.run(self.count_movements_since(since))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_outside_a_runtime_fails_cleanly() {
        let err = block_on_current(std::future::ready(Ok::<u8, StoreError>(1))).unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
    }

    #[test]
    fn blocking_on_a_current_thread_runtime_fails_cleanly() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let err = runtime
            .block_on(async { block_on_current(std::future::ready(Ok::<u8, StoreError>(1))) })
            .unwrap_err();
        assert!(matches!(err, StoreError::Storage(msg) if msg.contains("CurrentThread")));
    }

    #[test]
    fn blocking_on_a_multi_thread_runtime_runs_the_future() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        let value = runtime
            .block_on(async { block_on_current(std::future::ready(Ok::<u8, StoreError>(7))) })
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn oversized_values_are_rejected_before_reaching_the_database() {
        assert!(to_db(u64::MAX, "quantity").is_err());
        assert_eq!(to_db(42, "quantity").unwrap(), 42);
    }

    #[test]
    fn unknown_kind_in_a_row_is_a_storage_fault() {
        let row = LedgerRow {
            id: Uuid::now_v7(),
            stock_id: Uuid::now_v7(),
            kind: "RETURN".into(),
            quantity: 3,
            occurred_at: Utc::now(),
            order_id: None,
            shipment_id: None,
            reason: None,
        };
        assert!(matches!(row.into_record(), Err(StoreError::Storage(_))));
    }

    #[test]
    fn ledger_row_maps_to_record() {
        let order = Uuid::now_v7();
        let row = LedgerRow {
            id: Uuid::now_v7(),
            stock_id: Uuid::now_v7(),
            kind: "EXIT".into(),
            quantity: 3,
            occurred_at: Utc::now(),
            order_id: Some(order),
            shipment_id: None,
            reason: Some("picked".into()),
        };
        let record = row.into_record().unwrap();
        assert_eq!(record.kind, MovementKind::Exit);
        assert_eq!(record.order_id, Some(OrderId::from_uuid(order)));
    }
}
