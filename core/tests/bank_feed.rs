//! Integration tests for importing and seeding the bank feed.

mod common;

use common::{bank_line, deposited_batch, engine, feed_date};
use dealer_desk_core::{
    bank_transaction_service::NewBankTransaction,
    error::DeskError,
    model::{TxnDirection, TxnStatus},
    types::TenantContext,
};

fn line(transaction_id: &str, amount: f64, direction: Option<TxnDirection>) -> NewBankTransaction {
    NewBankTransaction {
        transaction_id: transaction_id.into(),
        date: feed_date(),
        description: "Imported line".into(),
        amount,
        direction,
    }
}

#[test]
fn direction_follows_the_sign_unless_given() {
    let engine = engine();
    let feed = engine.bank_transactions();

    let credit = feed.import_transaction(line("T-1", 100.0, None)).unwrap();
    let debit = feed.import_transaction(line("T-2", -12.5, None)).unwrap();
    let zero = feed.import_transaction(line("T-3", 0.0, None)).unwrap();
    let forced = feed
        .import_transaction(line("T-4", 5.0, Some(TxnDirection::Debit)))
        .unwrap();

    assert_eq!(credit.direction, TxnDirection::Credit);
    assert_eq!(debit.direction, TxnDirection::Debit);
    assert_eq!(zero.direction, TxnDirection::Debit);
    assert_eq!(forced.direction, TxnDirection::Debit);
    assert!([&credit, &debit, &zero, &forced]
        .iter()
        .all(|t| t.status == TxnStatus::Unmatched));
}

#[test]
fn duplicate_feed_ids_are_rejected() {
    let engine = engine();
    bank_line(&engine, "T-1", 10.0);
    let err = engine
        .bank_transactions()
        .import_transaction(line("T-1", 20.0, None))
        .unwrap_err();
    assert!(matches!(err, DeskError::InvalidState(_)));
    assert_eq!(engine.bank_transactions().list_transactions().unwrap().len(), 1);
}

#[test]
fn unknown_transaction_is_not_found() {
    let engine = engine();
    assert!(matches!(
        engine.bank_transactions().get_transaction("nope"),
        Err(DeskError::NotFound { .. })
    ));
}

#[test]
fn seeding_replaces_the_feed_and_its_matches() {
    let engine = engine();
    deposited_batch(&engine, 54.00);
    bank_line(&engine, "T-1", 54.00);
    engine.run_reconciliation().unwrap();
    assert_eq!(engine.reconciliation().list_matches().unwrap().len(), 1);

    let seeded = engine
        .bank_transactions()
        .seed_demo_transactions(feed_date())
        .unwrap();
    let ids: Vec<&str> = seeded.iter().map(|t| t.transaction_id.as_str()).collect();
    assert_eq!(
        ids,
        ["BANK-TXN-001", "BANK-TXN-002", "BANK-TXN-003", "BANK-TXN-004", "BANK-TXN-005"]
    );
    assert_eq!(seeded[3].date, feed_date() - chrono::Duration::days(3));
    assert_eq!(seeded[4].direction, TxnDirection::Debit);

    assert!(engine.reconciliation().list_matches().unwrap().is_empty());
    assert_eq!(engine.bank_transactions().list_transactions().unwrap().len(), 5);

    // Seeding twice does not trip the duplicate check.
    engine
        .bank_transactions()
        .seed_demo_transactions(feed_date())
        .unwrap();
    assert_eq!(engine.bank_transactions().list_transactions().unwrap().len(), 5);
}

#[test]
fn unmatched_lines_are_newest_first() {
    let engine = engine();
    engine
        .bank_transactions()
        .seed_demo_transactions(feed_date())
        .unwrap();
    let dates: Vec<_> = engine
        .bank_transactions()
        .unmatched_transactions()
        .unwrap()
        .into_iter()
        .map(|t| t.date)
        .collect();
    assert_eq!(dates.len(), 5);
    assert!(dates.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn feed_ids_are_unique_per_dealership() {
    let engine = engine();
    let first_dealer = engine.tenant.dealership_id.clone();
    engine
        .bank_transactions()
        .seed_demo_transactions(feed_date())
        .unwrap();

    let other = engine.with_tenant(TenantContext::new("DEALER-002", "ops"));
    let seeded = other
        .bank_transactions()
        .seed_demo_transactions(feed_date())
        .unwrap();
    assert_eq!(seeded[0].transaction_id, "BANK-TXN-001");
    assert!(seeded.iter().all(|t| t.dealership_id == "DEALER-002"));

    // Still a duplicate within the same dealership.
    assert!(matches!(
        other.bank_transactions().import_transaction(line("BANK-TXN-001", 1.0, None)),
        Err(DeskError::InvalidState(_))
    ));
    assert_eq!(other.store().bank_transactions(&first_dealer).unwrap().len(), 5);
    assert_eq!(other.bank_transactions().list_transactions().unwrap().len(), 5);
}
