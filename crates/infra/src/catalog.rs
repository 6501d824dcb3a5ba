//! Lookup-by-id access to reference entities owned elsewhere (resource
//! catalog, warehouses).

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use stockledger_core::{ResourceId, WarehouseId};

use crate::store::StoreError;

pub trait ReferenceCatalog: Send + Sync {
    fn resource_exists(&self, resource_id: ResourceId) -> Result<bool, StoreError>;

    fn warehouse_exists(&self, warehouse_id: WarehouseId) -> Result<bool, StoreError>;
}

impl<C> ReferenceCatalog for Arc<C>
where
    C: ReferenceCatalog + ?Sized,
{
    fn resource_exists(&self, resource_id: ResourceId) -> Result<bool, StoreError> {
        (**self).resource_exists(resource_id)
    }

    fn warehouse_exists(&self, warehouse_id: WarehouseId) -> Result<bool, StoreError> {
        (**self).warehouse_exists(warehouse_id)
    }
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryReferenceCatalog {
    resources: RwLock<HashSet<ResourceId>>,
    warehouses: RwLock<HashSet<WarehouseId>>,
}

impl InMemoryReferenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_resource(&self, resource_id: ResourceId) -> Result<(), StoreError> {
        self.resources
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?
            .insert(resource_id);
        Ok(())
    }

    pub fn register_warehouse(&self, warehouse_id: WarehouseId) -> Result<(), StoreError> {
        self.warehouses
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?
            .insert(warehouse_id);
        Ok(())
    }
}

impl ReferenceCatalog for InMemoryReferenceCatalog {
    fn resource_exists(&self, resource_id: ResourceId) -> Result<bool, StoreError> {
        let resources = self
            .resources
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;
        Ok(resources.contains(&resource_id))
    }

    fn warehouse_exists(&self, warehouse_id: WarehouseId) -> Result<bool, StoreError> {
        let warehouses = self
            .warehouses
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;
        Ok(warehouses.contains(&warehouse_id))
    }
}
