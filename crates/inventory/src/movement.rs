use core::cmp::Ordering;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, Entity, MovementId, OrderId, ShipmentId, StockId};

/// Longest free-text reason a movement may carry.
pub const MAX_REASON_LEN: usize = 200;

/// Direction of a movement. The quantity itself is always positive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Entry,
    Exit,
    /// One side of a two-sided move between warehouses.
    Transfer,
}

impl MovementKind {
    /// Kind implied by the sign of a delta (`None` for zero).
    pub fn from_delta(delta: i64) -> Option<Self> {
        match delta.signum() {
            1 => Some(Self::Entry),
            -1 => Some(Self::Exit),
            _ => None,
        }
    }

    /// ENTRY only adds, EXIT only removes, TRANSFER sides go either way.
    pub fn accepts_delta(self, delta: i64) -> bool {
        match self {
            Self::Entry => delta > 0,
            Self::Exit => delta < 0,
            Self::Transfer => delta != 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "ENTRY",
            Self::Exit => "EXIT",
            Self::Transfer => "TRANSFER",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENTRY" => Ok(Self::Entry),
            "EXIT" => Ok(Self::Exit),
            "TRANSFER" => Ok(Self::Transfer),
            other => Err(DomainError::invalid_argument(format!(
                "unknown movement kind '{other}'"
            ))),
        }
    }
}

/// A movement ready to be appended to the ledger (not yet assigned an id).
///
/// `quantity` is signed here only so malformed input can be represented and
/// rejected; [`NewMovement::into_record`] refuses anything `<= 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub stock_id: StockId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
    pub order_id: Option<OrderId>,
    pub shipment_id: Option<ShipmentId>,
    pub reason: Option<String>,
}

impl NewMovement {
    pub fn new(stock_id: StockId, kind: MovementKind, quantity: i64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            stock_id,
            kind,
            quantity,
            occurred_at,
            order_id: None,
            shipment_id: None,
            reason: None,
        }
    }

    pub fn with_order(mut self, order_id: Option<OrderId>) -> Self {
        self.order_id = order_id;
        self
    }

    pub fn with_shipment(mut self, shipment_id: Option<ShipmentId>) -> Self {
        self.shipment_id = shipment_id;
        self
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    /// Check the ledger invariants without consuming the draft.
    pub fn validate(&self) -> DomainResult<u64> {
        if self.quantity <= 0 {
            return Err(DomainError::invalid_argument(format!(
                "movement quantity must be positive (provided: {})",
                self.quantity
            )));
        }
        if let Some(reason) = &self.reason {
            if reason.chars().count() > MAX_REASON_LEN {
                return Err(DomainError::invalid_argument(format!(
                    "movement reason cannot exceed {MAX_REASON_LEN} characters"
                )));
            }
        }
        Ok(self.quantity as u64)
    }

    /// Seal the draft into an immutable ledger record.
    pub fn into_record(self, id: MovementId) -> DomainResult<MovementRecord> {
        let quantity = self.validate()?;
        let reason = self
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Ok(MovementRecord {
            id,
            stock_id: self.stock_id,
            kind: self.kind,
            quantity,
            occurred_at: self.occurred_at,
            order_id: self.order_id,
            shipment_id: self.shipment_id,
            reason,
        })
    }
}

/// Immutable audit record of one accepted stock change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: MovementId,
    pub stock_id: StockId,
    pub kind: MovementKind,
    /// Always positive; direction lives in `kind`.
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
    pub order_id: Option<OrderId>,
    pub shipment_id: Option<ShipmentId>,
    pub reason: Option<String>,
}

impl MovementRecord {
    /// Ledger ordering: newest `occurred_at` first, ties broken by newest id.
    pub fn newest_first(a: &Self, b: &Self) -> Ordering {
        b.occurred_at
            .cmp(&a.occurred_at)
            .then_with(|| b.id.cmp(&a.id))
    }
}

impl Entity for MovementRecord {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

pub fn sort_newest_first(movements: &mut [MovementRecord]) {
    movements.sort_by(MovementRecord::newest_first);
}
