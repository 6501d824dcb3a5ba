//! Service-level error returned to order intake, dispatch and correction callers.

use thiserror::Error;

use stockledger_core::DomainError;

use crate::store::StoreError;

/// What the stock services return.
///
/// `InsufficientStock` is a business rejection, not a fault; callers must not
/// retry it unchanged. `Consistency` means the paired stock/ledger write could
/// not be committed and nothing was applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: u64, requested: u64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("stock ledger commit failed: {0}")]
    Consistency(String),
}

impl From<DomainError> for InventoryError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidArgument(msg) | DomainError::InvalidId(msg) => {
                InventoryError::InvalidArgument(msg)
            }
            DomainError::NotFound { entity, id } => InventoryError::NotFound { entity, id },
            DomainError::InsufficientStock {
                available,
                requested,
            } => InventoryError::InsufficientStock {
                available,
                requested,
            },
            DomainError::Conflict(msg) => InventoryError::Conflict(msg),
        }
    }
}

impl From<StoreError> for InventoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Domain(e) => e.into(),
            StoreError::Concurrency(msg) => InventoryError::Conflict(msg),
            StoreError::Transient(msg) | StoreError::Storage(msg) => InventoryError::Consistency(msg),
        }
    }
}
