//! Integration tests for the reconciliation matcher.
//!
//! Covers the three pairing strategies, timing differences, the
//! suggestion-only contract and candidate reuse across credits.

mod common;

use common::{bank_line, deposited_batch, engine, engine_with};
use dealer_desk_core::{
    config::DeskConfig,
    engine::DeskEngine,
    event::DeskEvent,
    explain::{ExplainError, Explainer, ExplanationRequest, TextGenerator},
    forecast::PythonForecaster,
    model::{ExceptionType, MatchStatus, MatchType, TxnStatus},
    store::DeskStore,
};
use std::cell::Cell;
use std::rc::Rc;

// ─────────────────────────────────────────────────────────────────────────────
// Strategy outcomes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn exact_amount_gives_one_exact_match_and_no_exception() {
    let engine = engine();
    let batch = deposited_batch(&engine, 54.00);
    let txn = bank_line(&engine, "T-1", 54.00);

    let outcome = engine.run_reconciliation().unwrap();
    assert_eq!(outcome.matches_created, 1);
    assert_eq!(outcome.exceptions_created, 0);

    let m = engine
        .reconciliation()
        .match_for_transaction(&txn.id)
        .unwrap()
        .expect("match should exist");
    assert_eq!(m.deposit_batch_id, batch.id);
    assert_eq!(m.match_type, MatchType::ExactMatch);
    assert_eq!(m.confidence_score, 100.0);
    assert_eq!(m.status, MatchStatus::Suggested);
    assert!(m.ai_suggested);
    assert!(!m.user_confirmed);
    assert!(m.explanation.unwrap().contains("matches the deposit batch total"));
    assert!(engine.exceptions().open_exceptions().unwrap().is_empty());
}

#[test]
fn fee_shortfall_gives_match_and_merchant_fee_exception() {
    let engine = engine();
    let batch = deposited_batch(&engine, 500.00);
    let txn = bank_line(&engine, "T-1", 485.50);

    let outcome = engine.run_reconciliation().unwrap();
    assert_eq!(outcome.matches_created, 1);
    assert_eq!(outcome.exceptions_created, 1);

    let m = engine
        .reconciliation()
        .match_for_batch(&batch.id)
        .unwrap()
        .unwrap();
    assert_eq!(m.match_type, MatchType::MerchantFeeMatch);
    assert_eq!(m.confidence_score, 95.0);
    assert_eq!(m.bank_transaction_id, txn.id);

    let open = engine.exceptions().open_exceptions().unwrap();
    assert_eq!(open.len(), 1);
    let exc = &open[0];
    assert_eq!(exc.exception_type, ExceptionType::MerchantFee);
    assert!((exc.amount - 14.50).abs() < 1e-9);
    assert_eq!(exc.description, "Merchant fee detected: 2.90% ($14.50) on batch BATCH-001");
    assert_eq!(exc.suggested_gl_account, "6100 - Merchant Fee Expense");
    assert_eq!(exc.bank_transaction_id.as_deref(), Some(txn.id.as_str()));
    assert_eq!(exc.deposit_batch_id.as_deref(), Some(batch.id.as_str()));
    assert!(exc.memo.contains("merchant fee"));
}

#[test]
fn credit_with_no_candidate_raises_unmatched_exception() {
    let engine = engine();
    let txn = bank_line(&engine, "T-1", 250.00);

    let outcome = engine.run_reconciliation().unwrap();
    assert_eq!(outcome.matches_created, 0);
    assert_eq!(outcome.exceptions_created, 1);

    let open = engine.exceptions().open_exceptions().unwrap();
    assert_eq!(open.len(), 1);
    let exc = &open[0];
    assert_eq!(exc.exception_type, ExceptionType::UnmatchedTransaction);
    assert_eq!(exc.amount, 250.00);
    assert_eq!(exc.bank_transaction_id.as_deref(), Some(txn.id.as_str()));
    assert_eq!(exc.deposit_batch_id, None);
    assert_eq!(exc.suggested_gl_account, "1200 - Undeposited Funds");
    assert_eq!(exc.description, "Unmatched bank credit: $250.00 on 2026-10-15");
}

#[test]
fn unmatched_batch_raises_timing_difference() {
    let engine = engine();
    let batch = deposited_batch(&engine, 81.00);

    let outcome = engine.run_reconciliation().unwrap();
    assert_eq!(outcome.exceptions_created, 1);

    let exc = &engine.exceptions().open_exceptions().unwrap()[0];
    assert_eq!(exc.exception_type, ExceptionType::TimingDifference);
    assert_eq!(exc.amount, 81.00);
    assert_eq!(exc.deposit_batch_id.as_deref(), Some(batch.id.as_str()));
    assert_eq!(exc.bank_transaction_id, None);
    assert_eq!(exc.suggested_gl_account, "1210 - Deposits in Transit");
    assert_eq!(exc.description, "Deposit batch BATCH-001 ($81.00) not yet in bank feed");
}

#[test]
fn debits_are_not_considered() {
    let engine = engine();
    bank_line(&engine, "FEE-1", -25.00);

    let outcome = engine.run_reconciliation().unwrap();
    assert_eq!(outcome.matches_created, 0);
    assert_eq!(outcome.exceptions_created, 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Suggestion-only contract
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn run_does_not_flip_statuses() {
    let engine = engine();
    let batch = deposited_batch(&engine, 108.00);
    let txn = bank_line(&engine, "T-1", 108.00);

    engine.run_reconciliation().unwrap();

    let txn = engine.bank_transactions().get_transaction(&txn.id).unwrap();
    assert_eq!(txn.status, TxnStatus::Unmatched);
    let batch = engine.deposit_batches().get_batch(&batch.id).unwrap();
    assert!(!batch.reconciled);
}

#[test]
fn second_run_suggests_again_until_confirmed() {
    let engine = engine();
    deposited_batch(&engine, 54.00);
    bank_line(&engine, "T-1", 54.00);

    engine.run_reconciliation().unwrap();
    let second = engine.run_reconciliation().unwrap();
    assert_eq!(second.matches_created, 1);
    // The batch already has a persisted match, so no timing difference.
    assert_eq!(second.exceptions_created, 0);
    assert_eq!(engine.reconciliation().list_matches().unwrap().len(), 2);
}

#[test]
fn confirmed_pairs_leave_the_candidate_pool() {
    let engine = engine();
    let batch = deposited_batch(&engine, 54.00);
    let txn = bank_line(&engine, "T-1", 54.00);
    engine
        .reconciliation()
        .confirm_match(&txn.id, &batch.id, Default::default())
        .unwrap();

    let outcome = engine.run_reconciliation().unwrap();
    assert_eq!(outcome.matches_created, 0);
    assert_eq!(outcome.exceptions_created, 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Candidate reuse
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn by_default_one_batch_can_match_several_credits() {
    let engine = engine();
    let batch = deposited_batch(&engine, 54.00);
    bank_line(&engine, "T-1", 54.00);
    bank_line(&engine, "T-2", 54.00);

    let outcome = engine.run_reconciliation().unwrap();
    assert_eq!(outcome.matches_created, 2);
    let matches = engine.reconciliation().list_matches().unwrap();
    assert!(matches.iter().all(|m| m.deposit_batch_id == batch.id));
}

#[test]
fn exclusion_keeps_a_batch_to_one_credit_per_run() {
    let engine = engine_with(|c| c.reconciliation.exclude_matched_batches = true);
    deposited_batch(&engine, 54.00);
    bank_line(&engine, "T-1", 54.00);
    let second = bank_line(&engine, "T-2", 54.00);

    let outcome = engine.run_reconciliation().unwrap();
    assert_eq!(outcome.matches_created, 1);
    assert_eq!(outcome.exceptions_created, 1);

    let exc = &engine.exceptions().open_exceptions().unwrap()[0];
    assert_eq!(exc.exception_type, ExceptionType::UnmatchedTransaction);
    assert_eq!(exc.bank_transaction_id.as_deref(), Some(second.id.as_str()));
}

// ─────────────────────────────────────────────────────────────────────────────
// Demo feed end to end
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn demo_feed_reconciles_as_expected() {
    let engine = engine();
    for total in [54.00, 108.00, 496.80, 81.00] {
        deposited_batch(&engine, total);
    }
    engine
        .bank_transactions()
        .seed_demo_transactions(common::feed_date())
        .unwrap();

    let outcome = engine.run_reconciliation().unwrap();
    // 54 and 108 exact, 485.50 against 496.80 is a 2.27% fee.
    assert_eq!(outcome.matches_created, 3);
    // Fee, unknown 250.00 credit, and the 81.00 batch in transit.
    assert_eq!(outcome.exceptions_created, 3);

    let mut kinds: Vec<_> = engine
        .exceptions()
        .open_exceptions()
        .unwrap()
        .into_iter()
        .map(|e| e.exception_type)
        .collect();
    kinds.sort_by_key(|k| k.as_str());
    assert_eq!(
        kinds,
        vec![
            ExceptionType::MerchantFee,
            ExceptionType::TimingDifference,
            ExceptionType::UnmatchedTransaction,
        ]
    );

    let started = outcome.events.first().unwrap();
    assert_eq!(
        started,
        &DeskEvent::ReconciliationStarted {
            transactions: 4,
            batches: 4
        }
    );
    assert!(matches!(
        outcome.events.last(),
        Some(DeskEvent::ReconciliationCompleted {
            matches_created: 3,
            exceptions_created: 3
        })
    ));
    assert_eq!(
        engine
            .store()
            .event_count(&engine.tenant.dealership_id, "match_suggested")
            .unwrap(),
        3
    );
}

#[test]
fn runs_are_scoped_to_the_tenant() {
    let engine = engine();
    deposited_batch(&engine, 54.00);
    bank_line(&engine, "T-1", 54.00);

    let other = engine.with_tenant(dealer_desk_core::types::TenantContext::new("DEALER-002", "ops"));
    let outcome = other.run_reconciliation().unwrap();
    assert_eq!(outcome.matches_created, 0);
    assert_eq!(outcome.exceptions_created, 0);
}

#[test]
fn a_rejected_suggestion_still_covers_its_batch() {
    let engine = engine();
    let batch = deposited_batch(&engine, 81.00);
    let spare = deposited_batch(&engine, 300.00);
    let txn = bank_line(&engine, "T-1", 81.00);
    engine.run_reconciliation().unwrap();

    let suggestion = engine
        .reconciliation()
        .match_for_batch(&batch.id)
        .unwrap()
        .unwrap();
    engine.reconciliation().reject_match(&suggestion.id).unwrap();
    // Take the credit out of the pool against a different batch.
    engine
        .reconciliation()
        .confirm_match(&txn.id, &spare.id, Default::default())
        .unwrap();

    let outcome = engine.run_reconciliation().unwrap();
    assert_eq!(outcome.matches_created, 0);
    assert_eq!(outcome.exceptions_created, 0);
    assert!(!engine.deposit_batches().get_batch(&batch.id).unwrap().reconciled);
}

// ─────────────────────────────────────────────────────────────────────────────
// Degraded text generation
// ─────────────────────────────────────────────────────────────────────────────

/// Answers every other call; the rest fail as an unavailable service.
struct FlakyGenerator {
    calls: Rc<Cell<usize>>,
}

impl TextGenerator for FlakyGenerator {
    fn generate(&self, _prompt: &str) -> Result<String, ExplainError> {
        let n = self.calls.get() + 1;
        self.calls.set(n);
        if n % 2 == 0 {
            Err(ExplainError::Status(503))
        } else {
            Ok("Model memo".into())
        }
    }
}

#[test]
fn generator_failures_fall_back_without_stopping_the_run() {
    let calls = Rc::new(Cell::new(0));
    let config = DeskConfig::default_test();
    let store = DeskStore::in_memory().unwrap();
    store.migrate().unwrap();
    let forecaster = Box::new(PythonForecaster::new(&config.forecast));
    let explainer = Explainer::new(Box::new(FlakyGenerator {
        calls: Rc::clone(&calls),
    }));
    let engine = DeskEngine::new(store, config, explainer, forecaster);

    deposited_batch(&engine, 54.00);
    deposited_batch(&engine, 500.00);
    bank_line(&engine, "T-1", 54.00);
    bank_line(&engine, "T-2", 485.50);
    bank_line(&engine, "T-3", 250.00);

    let outcome = engine.run_reconciliation().unwrap();
    assert_eq!(outcome.matches_created, 2);
    assert_eq!(outcome.exceptions_created, 2);
    assert_eq!(calls.get(), 4);

    let match_fallback = ExplanationRequest::MatchExplanation {
        bank_amount: 0.0,
        batch_amount: 0.0,
        batch_number: String::new(),
    }
    .fallback();
    let mut texts: Vec<(String, &str)> = engine
        .reconciliation()
        .list_matches()
        .unwrap()
        .into_iter()
        .map(|m| (m.explanation.unwrap_or_default(), match_fallback))
        .collect();
    for exc in engine.exceptions().open_exceptions().unwrap() {
        let fallback = match exc.exception_type {
            ExceptionType::MerchantFee => ExplanationRequest::MerchantFeeMemo {
                expected_amount: 0.0,
                actual_amount: 0.0,
                fee_amount: 0.0,
                fee_percentage: 0.0,
            }
            .fallback(),
            _ => ExplanationRequest::UnmatchedTransactionMemo {
                amount: 0.0,
                direction: "CREDIT".into(),
            }
            .fallback(),
        };
        texts.push((exc.memo, fallback));
    }

    assert_eq!(texts.len(), 4);
    assert!(texts
        .iter()
        .all(|(text, fallback)| text == "Model memo" || text == fallback));
    let generated = texts.iter().filter(|(text, _)| text == "Model memo").count();
    assert_eq!(generated, 2);
}
