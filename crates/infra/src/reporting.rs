//! Read-only dashboard queries over stocks and the movement ledger.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockledger_inventory::{MovementKind, StockRecord};

use crate::config::{ReportingThresholds, MAX_MOVEMENT_CHART_DAYS};
use crate::error::InventoryError;
use crate::store::{MovementLedger, StockStore};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockLevel {
    Critical,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockEntry {
    pub stock: StockRecord,
    pub level: StockLevel,
}

/// Moved units per kind on one day.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMovementTotals {
    pub entry: u64,
    pub exit: u64,
    pub transfer: u64,
}

impl DailyMovementTotals {
    fn add(&mut self, kind: MovementKind, quantity: u64) {
        let slot = match kind {
            MovementKind::Entry => &mut self.entry,
            MovementKind::Exit => &mut self.exit,
            MovementKind::Transfer => &mut self.transfer,
        };
        *slot = slot.saturating_add(quantity);
    }
}

#[derive(Debug, Clone)]
pub struct StockReporter<S> {
    store: S,
}

impl<S> StockReporter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> StockReporter<S>
where
    S: StockStore + MovementLedger,
{
    /// Stocks at or below the low threshold, lowest first, capped at the list limit.
    pub fn low_stock(&self, thresholds: &ReportingThresholds) -> Result<Vec<LowStockEntry>, InventoryError> {
        let mut low: Vec<StockRecord> = self
            .store
            .list_all()?
            .into_iter()
            .filter(|s| s.quantity() <= thresholds.low_stock_threshold)
            .collect();
        low.sort_by_key(|s| (s.quantity(), s.id_typed()));
        low.truncate(thresholds.low_stock_list_limit);

        Ok(low
            .into_iter()
            .map(|stock| {
                let level = if stock.quantity() <= thresholds.critical_stock_threshold {
                    StockLevel::Critical
                } else {
                    StockLevel::Low
                };
                LowStockEntry { stock, level }
            })
            .collect())
    }

    /// Number of movements within the recent-activity window ending at `now`.
    pub fn recent_activity(
        &self,
        now: DateTime<Utc>,
        thresholds: &ReportingThresholds,
    ) -> Result<u64, InventoryError> {
        let since = now
            .checked_sub_signed(Duration::hours(i64::from(thresholds.recent_activity_hours)))
            .ok_or_else(|| {
                InventoryError::InvalidArgument(format!(
                    "recent activity window of {} hours reaches before the earliest representable time",
                    thresholds.recent_activity_hours
                ))
            })?;
        Ok(self.store.count_since(since)?)
    }

    /// Per-day totals (UTC) for the last `movement_chart_days` days including
    /// today; days without movements are present with zero totals.
    pub fn daily_movement_totals(
        &self,
        now: DateTime<Utc>,
        thresholds: &ReportingThresholds,
    ) -> Result<BTreeMap<NaiveDate, DailyMovementTotals>, InventoryError> {
        let days = thresholds.movement_chart_days;
        let mut totals = BTreeMap::new();
        if days == 0 {
            return Ok(totals);
        }
        if days > MAX_MOVEMENT_CHART_DAYS {
            return Err(InventoryError::InvalidArgument(format!(
                "movement chart of {days} days exceeds the maximum of {MAX_MOVEMENT_CHART_DAYS}"
            )));
        }

        let today = now.date_naive();
        let first_day = today
            .checked_sub_signed(Duration::days(i64::from(days) - 1))
            .ok_or_else(|| {
                InventoryError::InvalidArgument(format!(
                    "movement chart of {days} days reaches before the earliest representable date"
                ))
            })?;
        for day in first_day.iter_days().take_while(|day| *day <= today) {
            totals.insert(day, DailyMovementTotals::default());
        }

        let window_start = first_day.and_time(chrono::NaiveTime::MIN).and_utc();
        for movement in self.store.since(window_start)? {
            if let Some(slot) = totals.get_mut(&movement.occurred_at.date_naive()) {
                slot.add(movement.kind, movement.quantity);
            }
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stockledger_core::{ResourceId, WarehouseId};
    use stockledger_inventory::AdjustStock;

    use crate::store::{InMemoryStockStore, StockDelta};

    fn thresholds() -> ReportingThresholds {
        ReportingThresholds {
            low_stock_threshold: 10,
            critical_stock_threshold: 3,
            low_stock_list_limit: 2,
            recent_activity_hours: 24,
            movement_chart_days: 3,
        }
    }

    #[test]
    fn low_stock_is_ordered_tagged_and_limited() {
        let store = InMemoryStockStore::arc();
        for q in [50, 8, 2, 10] {
            store.create(ResourceId::new(), WarehouseId::new(), q, Utc::now()).unwrap();
        }

        let report = StockReporter::new(store).low_stock(&thresholds()).unwrap();
        let summary: Vec<_> = report.iter().map(|e| (e.stock.quantity(), e.level)).collect();
        assert_eq!(summary, vec![(2, StockLevel::Critical), (8, StockLevel::Low)]);
    }

    #[test]
    fn recent_activity_counts_the_window_only() {
        let store = InMemoryStockStore::arc();
        let now = Utc::now();
        store.create(ResourceId::new(), WarehouseId::new(), 5, now - Duration::hours(30)).unwrap();
        store.create(ResourceId::new(), WarehouseId::new(), 5, now - Duration::hours(2)).unwrap();

        assert_eq!(StockReporter::new(store).recent_activity(now, &thresholds()).unwrap(), 1);
    }

    #[test]
    fn daily_totals_split_by_day_and_kind() {
        let store = InMemoryStockStore::arc();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let stock = store
            .create(ResourceId::new(), WarehouseId::new(), 20, now - Duration::days(1))
            .unwrap();
        let exit = AdjustStock::new(stock.id_typed(), -5, now - Duration::hours(1));
        store.apply_delta(StockDelta::from_adjustment(&exit).unwrap()).unwrap();
        // Outside the window.
        let old = AdjustStock::new(stock.id_typed(), 1, now - Duration::days(5));
        store.apply_delta(StockDelta::from_adjustment(&old).unwrap()).unwrap();

        let totals = StockReporter::new(store).daily_movement_totals(now, &thresholds()).unwrap();
        let days: Vec<_> = totals.keys().map(|d| d.to_string()).collect();
        assert_eq!(days, vec!["2026-03-08", "2026-03-09", "2026-03-10"]);

        let yesterday = totals[&NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()];
        let today = totals[&NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()];
        assert_eq!(yesterday.entry, 20);
        assert_eq!(today.exit, 5);
        assert_eq!(totals[&NaiveDate::from_ymd_opt(2026, 3, 8).unwrap()], DailyMovementTotals::default());
    }

    #[test]
    fn zero_days_is_empty() {
        let reporter = StockReporter::new(InMemoryStockStore::new());
        let no_chart = ReportingThresholds {
            movement_chart_days: 0,
            ..thresholds()
        };
        assert!(reporter.daily_movement_totals(Utc::now(), &no_chart).unwrap().is_empty());
    }

    #[test]
    fn oversized_activity_window_is_rejected() {
        let reporter = StockReporter::new(InMemoryStockStore::new());
        let huge_window = ReportingThresholds {
            recent_activity_hours: u32::MAX,
            ..thresholds()
        };
        let err = reporter.recent_activity(Utc::now(), &huge_window).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidArgument(_)));
    }

    #[test]
    fn oversized_chart_is_rejected() {
        let reporter = StockReporter::new(InMemoryStockStore::new());
        let huge_chart = ReportingThresholds {
            movement_chart_days: u32::MAX,
            ..thresholds()
        };
        let err = reporter.daily_movement_totals(Utc::now(), &huge_chart).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidArgument(_)));

        let err = reporter
            .daily_movement_totals(DateTime::<Utc>::MIN_UTC, &thresholds())
            .unwrap_err();
        assert!(matches!(err, InventoryError::InvalidArgument(_)));
    }
}
