//! Integration tests for dashboard metrics and sequence codes.

mod common;

use common::{bank_line, deposited_batch, engine};
use dealer_desk_core::{
    model::{Customer, LineItem, Vehicle},
    reconciliation_service::ConfirmMatch,
    repair_order_service::NewRepairOrder,
    sequence::SequenceKind,
};

fn order() -> NewRepairOrder {
    NewRepairOrder {
        customer: Customer {
            name: "Dana Kim".into(),
            phone: "555-0199".into(),
        },
        vehicle: Vehicle {
            vin: None,
            year: "2019".into(),
            make: "Subaru".into(),
            model: "Outback".into(),
        },
        line_items: vec![LineItem::labor("Tire rotation", 1, 45.0)],
    }
}

#[test]
fn empty_books_are_ready_to_close() {
    let engine = engine();
    let metrics = engine.dashboard().unwrap();
    assert_eq!(metrics.close_readiness_percentage, 100);
    assert_eq!(metrics.open_repair_orders, 0);
}

#[test]
fn backlogs_reduce_readiness() {
    let engine = engine();

    let ro = engine.repair_orders().create_repair_order(order()).unwrap();
    let metrics = engine.dashboard().unwrap();
    assert_eq!(metrics.open_repair_orders, 1);
    // Open repair orders do not count against close.
    assert_eq!(metrics.close_readiness_percentage, 100);

    engine.repair_orders().close_repair_order(&ro.id).unwrap();
    engine.receipts().generate_receipt(&ro.id).unwrap();
    let metrics = engine.dashboard().unwrap();
    assert_eq!(metrics.unbatched_receipts, 1);
    assert_eq!(metrics.close_readiness_percentage, 70);

    let batch = deposited_batch(&engine, 54.00);
    let txn = bank_line(&engine, "T-1", 54.00);
    let metrics = engine.dashboard().unwrap();
    assert_eq!(metrics.unreconciled_batches, 1);
    assert_eq!(metrics.unmatched_bank_transactions, 1);
    assert_eq!(metrics.close_readiness_percentage, 30);

    bank_line(&engine, "T-2", 999.00);
    engine.run_reconciliation().unwrap();
    let metrics = engine.dashboard().unwrap();
    assert_eq!(metrics.open_exceptions, 1);
    assert_eq!(metrics.close_readiness_percentage, 0);

    engine
        .reconciliation()
        .confirm_match(&txn.id, &batch.id, ConfirmMatch::default())
        .unwrap();
    let metrics = engine.dashboard().unwrap();
    assert_eq!(metrics.unreconciled_batches, 0);
    assert_eq!(metrics.unmatched_bank_transactions, 1);
    assert_eq!(metrics.close_readiness_percentage, 40);
}

#[test]
fn peeking_a_code_is_idempotent() {
    let engine = engine();
    let store = engine.store();
    assert_eq!(store.peek_code(SequenceKind::RepairOrder).unwrap(), "RO-001");
    assert_eq!(store.peek_code(SequenceKind::RepairOrder).unwrap(), "RO-001");

    for _ in 0..3 {
        engine.repair_orders().create_repair_order(order()).unwrap();
    }
    assert_eq!(store.peek_code(SequenceKind::RepairOrder).unwrap(), "RO-004");
    assert_eq!(store.peek_code(SequenceKind::RepairOrder).unwrap(), "RO-004");
    assert_eq!(
        engine.repair_orders().create_repair_order(order()).unwrap().ro_number,
        "RO-004"
    );
}
