//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use dealer_desk_core::{
    bank_transaction_service::NewBankTransaction,
    config::DeskConfig,
    engine::DeskEngine,
    explain::Explainer,
    forecast::PythonForecaster,
    model::{BankTransaction, BatchStatus, DepositBatch},
    sequence::SequenceKind,
    store::DeskStore,
    types::new_id,
};

/// Route library logs to the test harness; repeat calls are harmless.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn engine() -> DeskEngine {
    init_logging();
    DeskEngine::build_test().expect("build_test failed")
}

/// Test engine with a customised config.
pub fn engine_with(configure: impl FnOnce(&mut DeskConfig)) -> DeskEngine {
    init_logging();
    let mut config = DeskConfig::default_test();
    configure(&mut config);
    let store = DeskStore::in_memory().unwrap();
    store.migrate().unwrap();
    let forecaster = Box::new(PythonForecaster::new(&config.forecast));
    DeskEngine::new(store, config, Explainer::offline(), forecaster)
}

pub fn feed_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
}

/// A deposited, unreconciled batch with an exact total, written straight
/// to the store so the total is not subject to tax arithmetic.
pub fn deposited_batch(engine: &DeskEngine, total: f64) -> DepositBatch {
    let store = engine.store();
    let now = Utc::now();
    let batch = DepositBatch {
        id: new_id(),
        dealership_id: engine.tenant.dealership_id.clone(),
        batch_number: store.allocate_code(SequenceKind::DepositBatch).unwrap(),
        receipt_ids: vec![],
        total,
        status: BatchStatus::Deposited,
        reconciled: false,
        deposited_at: Some(now),
        created_at: now,
        updated_at: now,
    };
    store.insert_deposit_batch(&batch).unwrap();
    batch
}

pub fn bank_line(engine: &DeskEngine, transaction_id: &str, amount: f64) -> BankTransaction {
    engine
        .bank_transactions()
        .import_transaction(NewBankTransaction {
            transaction_id: transaction_id.into(),
            date: feed_date(),
            description: format!("Feed line {transaction_id}"),
            amount,
            direction: None,
        })
        .unwrap()
}
