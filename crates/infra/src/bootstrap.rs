//! Startup wiring: config → logging → store → services.
//!
//! `USE_PERSISTENT_STORES=false` (the default) keeps everything in memory;
//! otherwise the Postgres store is connected and its schema ensured before
//! any service sees it.

use std::sync::Arc;

use tracing::info;

use stockledger_observability::{init_with, DEFAULT_FILTER};

use crate::adjustment::StockAdjustmentService;
use crate::config::{InventoryConfig, StorageBackend};
use crate::store::{InMemoryStockStore, PostgresStockStore, StockBackend, StoreError};

/// Store handle shared by every service of one process.
pub type SharedStockBackend = Arc<dyn StockBackend>;

/// Open the store named by `storage`.
pub async fn open_store(storage: &StorageBackend) -> Result<SharedStockBackend, StoreError> {
    match storage {
        StorageBackend::InMemory => {
            info!("using in-memory stock store");
            Ok(Arc::new(InMemoryStockStore::new()))
        }
        StorageBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PostgresStockStore::connect(database_url, *max_connections).await?;
            store.ensure_schema().await?;
            info!(max_connections, "using postgres stock store");
            Ok(Arc::new(store))
        }
    }
}

/// Initialize logging in the configured format, open the configured store
/// and build the adjustment service on top of it.
///
/// The Postgres store must afterwards be driven from a multi-threaded runtime.
pub async fn bootstrap<C>(
    config: &InventoryConfig,
    catalog: C,
) -> Result<StockAdjustmentService<SharedStockBackend, C>, StoreError> {
    init_with(config.log_format, DEFAULT_FILTER);
    let store = open_store(&config.storage).await?;
    Ok(StockAdjustmentService::from_config(store, catalog, config))
}
