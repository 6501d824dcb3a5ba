//! Integration tests for the full stock ledger pipeline.
//!
//! Tests: Catalog → StockAdjustmentService → StockStore/MovementLedger → Availability/Admission
//!
//! Verifies:
//! - Quantities and the ledger always move together
//! - Quantities never go negative, also under concurrent adjustments
//! - Multi-row commands (transfer, shipment) are all-or-nothing

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    use chrono::Utc;
    use proptest::prelude::*;

    use stockledger_core::{OrderId, ResourceId, ShipmentId, StockId, WarehouseId};
    use stockledger_inventory::{
        AdjustStock, DeliveryLine, MovementKind, NewMovement, OrderItemRequest, ShipmentDelivery,
        StockRecord, TransferStock,
    };

    use crate::adjustment::StockAdjustmentService;
    use crate::admission::OrderItemAdmission;
    use crate::availability::AvailabilityAggregator;
    use crate::catalog::InMemoryReferenceCatalog;
    use crate::error::InventoryError;
    use crate::store::{InMemoryStockStore, MovementLedger, StockStore};

    type Service = StockAdjustmentService<Arc<InMemoryStockStore>, Arc<InMemoryReferenceCatalog>>;

    struct Harness {
        store: Arc<InMemoryStockStore>,
        catalog: Arc<InMemoryReferenceCatalog>,
        service: Arc<Service>,
    }

    fn setup() -> Harness {
        let store = InMemoryStockStore::arc();
        let catalog = Arc::new(InMemoryReferenceCatalog::new());
        let service = Arc::new(StockAdjustmentService::new(store.clone(), catalog.clone()));
        Harness {
            store,
            catalog,
            service,
        }
    }

    impl Harness {
        fn stock(&self, resource_id: ResourceId, warehouse_id: WarehouseId, quantity: i64) -> StockRecord {
            self.catalog.register_resource(resource_id).unwrap();
            self.catalog.register_warehouse(warehouse_id).unwrap();
            self.service
                .create_stock(resource_id, warehouse_id, quantity, Utc::now())
                .unwrap()
        }

        fn quantity(&self, stock_id: StockId) -> u64 {
            self.store.get(stock_id).unwrap().quantity()
        }

        fn exits(&self, stock_id: StockId) -> usize {
            self.store
                .for_stock(stock_id)
                .unwrap()
                .iter()
                .filter(|m| m.kind == MovementKind::Exit)
                .count()
        }
    }

    #[test]
    fn scenario_a_exit_reduces_quantity_and_records_movement() {
        let h = setup();
        let stock = h.stock(ResourceId::new(), WarehouseId::new(), 50);

        let after = h
            .service
            .adjust(AdjustStock::new(stock.id_typed(), -20, Utc::now()).with_kind(MovementKind::Exit))
            .unwrap();
        assert_eq!(after.quantity(), 30);

        let movements = h.store.for_stock(stock.id_typed()).unwrap();
        let exits: Vec<_> = movements.iter().filter(|m| m.kind == MovementKind::Exit).collect();
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].quantity, 20);
    }

    #[test]
    fn scenario_b_overdraw_is_rejected_without_side_effects() {
        let h = setup();
        let stock = h.stock(ResourceId::new(), WarehouseId::new(), 30);
        let ledger_before = h.store.for_stock(stock.id_typed()).unwrap();

        let err = h
            .service
            .adjust(AdjustStock::new(stock.id_typed(), -50, Utc::now()).with_kind(MovementKind::Exit))
            .unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                available: 30,
                requested: 50
            }
        );
        assert_eq!(h.quantity(stock.id_typed()), 30);
        assert_eq!(h.store.for_stock(stock.id_typed()).unwrap(), ledger_before);
    }

    #[test]
    fn scenario_c_admission_uses_cross_warehouse_total() {
        let h = setup();
        let resource_id = ResourceId::new();
        h.stock(resource_id, WarehouseId::new(), 30);
        h.stock(resource_id, WarehouseId::new(), 10);

        let admission = OrderItemAdmission::new(h.store.clone());
        assert!(admission.validate(resource_id, 35).is_ok());
        assert!(matches!(
            admission.validate(resource_id, 45),
            Err(InventoryError::InsufficientStock { available: 40, requested: 45 })
        ));
    }

    #[test]
    fn scenario_d_zero_quantity_append_is_rejected() {
        let h = setup();
        let stock = h.stock(ResourceId::new(), WarehouseId::new(), 0);

        let err = h
            .store
            .append(NewMovement::new(stock.id_typed(), MovementKind::Entry, 0, Utc::now()))
            .unwrap_err();
        assert!(matches!(
            InventoryError::from(err),
            InventoryError::InvalidArgument(_)
        ));
        assert!(h.store.for_stock(stock.id_typed()).unwrap().is_empty());
    }

    #[test]
    fn scenario_e_concurrent_overdraw_admits_exactly_one() {
        for _ in 0..50 {
            let h = setup();
            let stock = h.stock(ResourceId::new(), WarehouseId::new(), 15);
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let service = h.service.clone();
                    let barrier = barrier.clone();
                    let stock_id = stock.id_typed();
                    thread::spawn(move || {
                        barrier.wait();
                        service.adjust(AdjustStock::new(stock_id, -10, Utc::now()))
                    })
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let succeeded = results.iter().filter(|r| r.is_ok()).count();
            let rejected = results
                .iter()
                .filter(|r| matches!(r, Err(InventoryError::InsufficientStock { .. })))
                .count();

            assert_eq!((succeeded, rejected), (1, 1));
            assert_eq!(h.quantity(stock.id_typed()), 5);
            assert_eq!(h.exits(stock.id_typed()), 1);
        }
    }

    #[test]
    fn adjustments_on_different_rows_do_not_interfere() {
        let h = setup();
        let resource_id = ResourceId::new();
        let stocks: Vec<_> = (0..4).map(|_| h.stock(resource_id, WarehouseId::new(), 0)).collect();
        let barrier = Arc::new(Barrier::new(stocks.len()));

        let handles: Vec<_> = stocks
            .iter()
            .map(|stock| {
                let service = h.service.clone();
                let barrier = barrier.clone();
                let stock_id = stock.id_typed();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..100 {
                        service.adjust(AdjustStock::new(stock_id, 1, Utc::now())).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let availability = AvailabilityAggregator::new(h.store.clone());
        assert_eq!(availability.total_available(resource_id).unwrap(), 400);
        for stock in &stocks {
            assert_eq!(h.store.for_stock(stock.id_typed()).unwrap().len(), 100);
        }
    }

    #[test]
    fn opposing_transfers_do_not_deadlock() {
        let h = setup();
        let resource_id = ResourceId::new();
        let a = h.stock(resource_id, WarehouseId::new(), 1_000).id_typed();
        let b = h.stock(resource_id, WarehouseId::new(), 1_000).id_typed();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [(a, b), (b, a)]
            .into_iter()
            .map(|(from, to)| {
                let service = h.service.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..200 {
                        service.transfer(TransferStock::new(from, to, 1, Utc::now())).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(h.quantity(a) + h.quantity(b), 2_000);
    }

    #[test]
    fn availability_never_sees_a_half_applied_transfer() {
        let h = setup();
        let resource_id = ResourceId::new();
        let a = h.stock(resource_id, WarehouseId::new(), 1_000).id_typed();
        let b = h.stock(resource_id, WarehouseId::new(), 1_000).id_typed();
        let done = Arc::new(AtomicBool::new(false));
        let barrier = Arc::new(Barrier::new(3));

        let writers: Vec<_> = [(a, b), (b, a)]
            .into_iter()
            .map(|(from, to)| {
                let service = h.service.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..2_000 {
                        service.transfer(TransferStock::new(from, to, 1, Utc::now())).unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let availability = AvailabilityAggregator::new(h.store.clone());
            let store = h.store.clone();
            let done = done.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let mut torn = Vec::new();
                while !done.load(Ordering::Acquire) {
                    let total = availability.total_available(resource_id).unwrap();
                    if total != 2_000 {
                        torn.push(total);
                    }
                    // The ledger is read under the same snapshot rule.
                    let moved = store.count_since(chrono::DateTime::<Utc>::MIN_UTC).unwrap();
                    if moved % 2 != 0 {
                        torn.push(moved);
                    }
                }
                torn
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        done.store(true, Ordering::Release);

        assert_eq!(reader.join().unwrap(), Vec::<u64>::new());
        assert_eq!(h.quantity(a) + h.quantity(b), 2_000);
    }

    #[test]
    fn failed_transfer_leaves_both_rows_and_ledger_untouched() {
        let h = setup();
        let resource_id = ResourceId::new();
        let from = h.stock(resource_id, WarehouseId::new(), 3);
        let to = h.stock(resource_id, WarehouseId::new(), 7);

        let err = h
            .service
            .transfer(TransferStock::new(from.id_typed(), to.id_typed(), 5, Utc::now()))
            .unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { .. }));
        assert_eq!((h.quantity(from.id_typed()), h.quantity(to.id_typed())), (3, 7));
        assert_eq!(h.store.for_stock(to.id_typed()).unwrap().len(), 1);
    }

    #[test]
    fn shipment_fulfillment_is_all_or_nothing() {
        let h = setup();
        let warehouse_id = WarehouseId::new();
        let (bolts, nuts) = (ResourceId::new(), ResourceId::new());
        let bolt_stock = h.stock(bolts, warehouse_id, 10);
        let nut_stock = h.stock(nuts, warehouse_id, 2);
        let order_id = OrderId::new();

        let delivery = |quantity| ShipmentDelivery {
            shipment_id: ShipmentId::new(),
            order_id,
            warehouse_id,
            occurred_at: Utc::now(),
            lines: vec![
                DeliveryLine { resource_id: bolts, quantity: 4 },
                DeliveryLine { resource_id: nuts, quantity },
            ],
        };

        let err = h.service.fulfill_shipment(delivery(3)).unwrap_err();
        assert!(matches!(err, InventoryError::InsufficientStock { available: 2, requested: 3 }));
        assert_eq!(h.quantity(bolt_stock.id_typed()), 10);
        assert!(h.store.last_n_for_order(order_id, 10).unwrap().is_empty());

        let rows = h.service.fulfill_shipment(delivery(2)).unwrap();
        assert_eq!(rows.iter().map(StockRecord::quantity).collect::<Vec<_>>(), vec![6, 0]);
        assert_eq!(h.store.last_n_for_order(order_id, 10).unwrap().len(), 2);
        assert_eq!(h.quantity(nut_stock.id_typed()), 0);
    }

    #[test]
    fn reads_are_idempotent() {
        let h = setup();
        let resource_id = ResourceId::new();
        let stock = h.stock(resource_id, WarehouseId::new(), 12);
        h.service
            .adjust(AdjustStock::new(stock.id_typed(), -2, Utc::now()).with_order(OrderId::new()))
            .unwrap();

        let availability = AvailabilityAggregator::new(h.store.clone());
        let admission = OrderItemAdmission::new(h.store.clone());
        let request = OrderItemRequest::new(OrderId::new(), resource_id, 10);

        for _ in 0..3 {
            assert_eq!(availability.total_available(resource_id).unwrap(), 10);
            assert!(admission.admit(&request).is_ok());
        }
        assert_eq!(h.store.for_stock(stock.id_typed()).unwrap().len(), 2);
        assert_eq!(h.quantity(stock.id_typed()), 10);
    }

    #[test]
    fn delete_is_refused_once_stock_has_moved() {
        let h = setup();
        let stock = h.stock(ResourceId::new(), WarehouseId::new(), 0);
        h.service.adjust(AdjustStock::new(stock.id_typed(), 1, Utc::now())).unwrap();

        assert!(matches!(
            h.service.delete_stock(stock.id_typed()),
            Err(InventoryError::Conflict(_))
        ));
        assert_eq!(h.quantity(stock.id_typed()), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

        /// Replaying accepted movements from zero reproduces the stored quantity,
        /// and every accepted delta left exactly one movement.
        #[test]
        fn ledger_explains_quantity(initial in 0i64..100, deltas in prop::collection::vec(-60i64..60, 0..30)) {
            let h = setup();
            let stock = h.stock(ResourceId::new(), WarehouseId::new(), initial);
            let mut accepted = 0usize;

            for delta in deltas {
                match h.service.adjust(AdjustStock::new(stock.id_typed(), delta, Utc::now())) {
                    Ok(_) => accepted += 1,
                    Err(InventoryError::InsufficientStock { .. }) | Err(InventoryError::InvalidArgument(_)) => {}
                    Err(other) => prop_assert!(false, "unexpected error: {other}"),
                }
            }

            let movements = h.store.for_stock(stock.id_typed()).unwrap();
            let replayed = movements.iter().fold(0i64, |q, m| match m.kind {
                MovementKind::Entry => q + m.quantity as i64,
                MovementKind::Exit => q - m.quantity as i64,
                MovementKind::Transfer => q,
            });

            let initial_entries = usize::from(initial > 0);
            prop_assert_eq!(movements.len(), accepted + initial_entries);
            prop_assert_eq!(replayed as u64, h.quantity(stock.id_typed()));
        }
    }
}
