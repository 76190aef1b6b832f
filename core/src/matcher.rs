//! Reconciliation matcher: pairs unmatched bank credits with unreconciled
//! deposit batches and raises exceptions for whatever cannot be paired.
//!
//! Order of work for one run:
//!   1. For each unmatched CREDIT, in feed order:
//!        a. exact:        first batch with |total - amount| < epsilon
//!        b. merchant fee: first batch whose shortfall is inside the fee band
//!                         (match + MERCHANT_FEE exception)
//!        c. otherwise:    UNMATCHED_TRANSACTION exception
//!   2. For each batch in the candidate set with no persisted match at all:
//!        TIMING_DIFFERENCE exception
//!
//! RULE: the matcher only suggests. Matches are written as SUGGESTED and
//! neither the transaction nor the batch changes status; that happens on
//! manual confirmation.
//!
//! A batch stays in the candidate pool after it is matched unless
//! `exclude_matched_batches` is set, so by default one batch can be
//! suggested for several credits in the same run.

use crate::{
    config::{MerchantFeeConfig, ReconciliationConfig},
    error::DeskResult,
    event::DeskEvent,
    exception_service::{ExceptionService, NewException},
    explain::{Explainer, ExplanationRequest},
    model::{
        BankTransaction, DepositBatch, ExceptionType, MatchStatus, MatchType,
        ReconciliationMatch, TxnDirection, TxnStatus,
    },
    store::DeskStore,
    types::{new_id, TenantContext},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

// ── Strategies ─────────────────────────────────────────────────────

/// How one bank credit relates to the candidate batches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pairing {
    Exact {
        batch: usize,
    },
    MerchantFee {
        batch: usize,
        fee_amount: f64,
        fee_percentage: f64,
    },
    Unmatched,
}

/// Shortfall of `amount` against `batch_total`, in percent of the batch.
/// None for batches with no positive total.
pub fn fee_percentage(batch_total: f64, amount: f64) -> Option<f64> {
    if batch_total <= 0.0 {
        return None;
    }
    Some((batch_total - amount) / batch_total * 100.0)
}

/// Apply the strategies in order to one credit. `available` says whether
/// a batch index may still be paired in this run.
pub fn pair_credit(
    amount: f64,
    batches: &[DepositBatch],
    available: impl Fn(usize) -> bool,
    recon: &ReconciliationConfig,
    fee_band: &MerchantFeeConfig,
) -> Pairing {
    let exact = batches.iter().enumerate().position(|(i, b)| {
        available(i) && (amount - b.total).abs() < recon.exact_match_epsilon
    });
    if let Some(batch) = exact {
        return Pairing::Exact { batch };
    }

    for (batch, b) in batches.iter().enumerate() {
        if !available(batch) {
            continue;
        }
        let Some(pct) = fee_percentage(b.total, amount) else {
            continue;
        };
        if pct >= fee_band.min_percentage && pct <= fee_band.max_percentage {
            return Pairing::MerchantFee {
                batch,
                fee_amount: b.total - amount,
                fee_percentage: pct,
            };
        }
    }

    Pairing::Unmatched
}

// ── Run ────────────────────────────────────────────────────────────

/// What one reconciliation run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub matches_created: usize,
    pub exceptions_created: usize,
    /// Every event the run appended, in order.
    pub events: Vec<DeskEvent>,
}

pub struct ReconciliationMatcher<'a> {
    store: &'a DeskStore,
    tenant: &'a TenantContext,
    recon: &'a ReconciliationConfig,
    fee_band: &'a MerchantFeeConfig,
    explainer: &'a Explainer,
}

impl<'a> ReconciliationMatcher<'a> {
    pub fn new(
        store: &'a DeskStore,
        tenant: &'a TenantContext,
        recon: &'a ReconciliationConfig,
        fee_band: &'a MerchantFeeConfig,
        explainer: &'a Explainer,
    ) -> Self {
        Self {
            store,
            tenant,
            recon,
            fee_band,
            explainer,
        }
    }

    pub fn run(&self) -> DeskResult<ReconciliationOutcome> {
        let dealership = &self.tenant.dealership_id;
        let credits = self.store.bank_transactions_by_status_and_direction(
            dealership,
            TxnStatus::Unmatched,
            TxnDirection::Credit,
        )?;
        let batches = self.store.unreconciled_batches(dealership)?;

        log::info!(
            "Starting reconciliation for {dealership}: {} unmatched credits, {} unreconciled batches",
            credits.len(),
            batches.len()
        );

        let mut outcome = ReconciliationOutcome::default();
        self.record(
            &mut outcome,
            DeskEvent::ReconciliationStarted {
                transactions: credits.len(),
                batches: batches.len(),
            },
        )?;

        let mut claimed = vec![false; batches.len()];
        for txn in &credits {
            let exclude = self.recon.exclude_matched_batches;
            let pairing = pair_credit(
                txn.amount,
                &batches,
                |i| !(exclude && claimed[i]),
                self.recon,
                self.fee_band,
            );

            match pairing {
                Pairing::Exact { batch } => {
                    claimed[batch] = true;
                    self.suggest(
                        &mut outcome,
                        txn,
                        &batches[batch],
                        MatchType::ExactMatch,
                        self.recon.exact_match_confidence,
                    )?;
                }
                Pairing::MerchantFee {
                    batch,
                    fee_amount,
                    fee_percentage,
                } => {
                    claimed[batch] = true;
                    let b = &batches[batch];
                    self.suggest(
                        &mut outcome,
                        txn,
                        b,
                        MatchType::MerchantFeeMatch,
                        self.recon.merchant_fee_confidence,
                    )?;
                    self.raise_merchant_fee(&mut outcome, txn, b, fee_amount, fee_percentage)?;
                }
                Pairing::Unmatched => self.raise_unmatched(&mut outcome, txn)?,
            }
        }

        // Checked against persisted matches, so suggestions from earlier
        // runs count as well as the ones just written.
        for batch in &batches {
            if !self.store.batch_has_match(&batch.id)? {
                self.raise_timing_difference(&mut outcome, batch)?;
            }
        }

        let completed = DeskEvent::ReconciliationCompleted {
            matches_created: outcome.matches_created,
            exceptions_created: outcome.exceptions_created,
        };
        self.record(&mut outcome, completed)?;

        log::info!(
            "Reconciliation complete: {} matches, {} exceptions",
            outcome.matches_created,
            outcome.exceptions_created
        );
        Ok(outcome)
    }

    fn record(&self, outcome: &mut ReconciliationOutcome, event: DeskEvent) -> DeskResult<()> {
        self.store
            .append_event(&self.tenant.dealership_id, &event)?;
        outcome.events.push(event);
        Ok(())
    }

    fn suggest(
        &self,
        outcome: &mut ReconciliationOutcome,
        txn: &BankTransaction,
        batch: &DepositBatch,
        match_type: MatchType,
        confidence: f64,
    ) -> DeskResult<()> {
        let explanation = self.explainer.explain(&ExplanationRequest::MatchExplanation {
            bank_amount: txn.amount,
            batch_amount: batch.total,
            batch_number: batch.batch_number.clone(),
        });

        let m = ReconciliationMatch {
            id: new_id(),
            dealership_id: self.tenant.dealership_id.clone(),
            bank_transaction_id: txn.id.clone(),
            deposit_batch_id: batch.id.clone(),
            match_type,
            confidence_score: confidence,
            ai_suggested: true,
            ai_reasons: Vec::new(),
            explanation: Some(explanation),
            status: MatchStatus::Suggested,
            user_confirmed: false,
            matched_by: None,
            matched_at: Utc::now(),
        };
        let event = DeskEvent::MatchSuggested {
            match_id: m.id.clone(),
            bank_transaction_id: m.bank_transaction_id.clone(),
            deposit_batch_id: m.deposit_batch_id.clone(),
            match_type,
            confidence,
        };

        self.store.in_transaction(|store| {
            store.insert_match(&m)?;
            store.append_event(&m.dealership_id, &event)
        })?;
        outcome.events.push(event);
        outcome.matches_created += 1;

        log::info!(
            "Suggested {match_type} match: bank {} ({:.2}) <-> {} ({:.2})",
            txn.transaction_id,
            txn.amount,
            batch.batch_number,
            batch.total
        );
        Ok(())
    }

    fn raise(&self, outcome: &mut ReconciliationOutcome, new_exc: NewException) -> DeskResult<()> {
        let exception = ExceptionService::new(self.store, self.tenant).create_exception(new_exc)?;
        outcome.events.push(DeskEvent::ExceptionRaised {
            exception_id: exception.id,
            exception_number: exception.exception_number,
            exception_type: exception.exception_type,
            amount: exception.amount,
        });
        outcome.exceptions_created += 1;
        Ok(())
    }

    fn raise_merchant_fee(
        &self,
        outcome: &mut ReconciliationOutcome,
        txn: &BankTransaction,
        batch: &DepositBatch,
        fee_amount: f64,
        fee_percentage: f64,
    ) -> DeskResult<()> {
        let memo = self.explainer.explain(&ExplanationRequest::MerchantFeeMemo {
            expected_amount: batch.total,
            actual_amount: txn.amount,
            fee_amount,
            fee_percentage,
        });
        self.raise(
            outcome,
            NewException {
                exception_type: ExceptionType::MerchantFee,
                description: format!(
                    "Merchant fee detected: {fee_percentage:.2}% (${fee_amount:.2}) on batch {}",
                    batch.batch_number
                ),
                amount: fee_amount,
                bank_transaction_id: Some(txn.id.clone()),
                deposit_batch_id: Some(batch.id.clone()),
                memo,
                suggested_gl_account: self.recon.gl_accounts.merchant_fee_expense.clone(),
            },
        )
    }

    fn raise_unmatched(
        &self,
        outcome: &mut ReconciliationOutcome,
        txn: &BankTransaction,
    ) -> DeskResult<()> {
        let memo = self
            .explainer
            .explain(&ExplanationRequest::UnmatchedTransactionMemo {
                amount: txn.amount,
                direction: txn.direction.to_string(),
            });
        self.raise(
            outcome,
            NewException {
                exception_type: ExceptionType::UnmatchedTransaction,
                description: format!(
                    "Unmatched bank {}: ${:.2} on {}",
                    txn.direction.as_str().to_lowercase(),
                    txn.amount.abs(),
                    txn.date
                ),
                amount: txn.amount,
                bank_transaction_id: Some(txn.id.clone()),
                deposit_batch_id: None,
                memo,
                suggested_gl_account: self.recon.gl_accounts.undeposited_funds.clone(),
            },
        )
    }

    fn raise_timing_difference(
        &self,
        outcome: &mut ReconciliationOutcome,
        batch: &DepositBatch,
    ) -> DeskResult<()> {
        let memo = self.explainer.explain(&ExplanationRequest::TimingDifferenceMemo {
            batch_number: batch.batch_number.clone(),
            amount: batch.total,
        });
        self.raise(
            outcome,
            NewException {
                exception_type: ExceptionType::TimingDifference,
                description: format!(
                    "Deposit batch {} (${:.2}) not yet in bank feed",
                    batch.batch_number, batch.total
                ),
                amount: batch.total,
                bank_transaction_id: None,
                deposit_batch_id: Some(batch.id.clone()),
                memo,
                suggested_gl_account: self.recon.gl_accounts.deposits_in_transit.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BatchStatus;

    fn batch(total: f64) -> DepositBatch {
        let now = Utc::now();
        DepositBatch {
            id: new_id(),
            dealership_id: "D".into(),
            batch_number: "BATCH-001".into(),
            receipt_ids: vec![],
            total,
            status: BatchStatus::Deposited,
            reconciled: false,
            deposited_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    fn pair(amount: f64, batches: &[DepositBatch]) -> Pairing {
        pair_credit(
            amount,
            batches,
            |_| true,
            &ReconciliationConfig::default(),
            &MerchantFeeConfig::default(),
        )
    }

    #[test]
    fn exact_wins_within_a_cent() {
        assert_eq!(pair(54.0, &[batch(54.0)]), Pairing::Exact { batch: 0 });
        assert_eq!(pair(54.005, &[batch(54.0)]), Pairing::Exact { batch: 0 });
        assert_eq!(pair(54.02, &[batch(54.0)]), Pairing::Unmatched);
    }

    #[test]
    fn exact_is_preferred_over_an_earlier_fee_candidate() {
        let batches = [batch(500.0), batch(485.5)];
        assert_eq!(pair(485.5, &batches), Pairing::Exact { batch: 1 });
    }

    #[test]
    fn fee_band_is_inclusive() {
        match pair(485.5, &[batch(500.0)]) {
            Pairing::MerchantFee {
                batch,
                fee_amount,
                fee_percentage,
            } => {
                assert_eq!(batch, 0);
                assert!((fee_amount - 14.5).abs() < 1e-9);
                assert!((fee_percentage - 2.9).abs() < 1e-9);
            }
            other => panic!("expected fee match, got {other:?}"),
        }
        assert_eq!(pair(192.0, &[batch(200.0)]), Pairing::Unmatched);
        assert_eq!(pair(198.0, &[batch(200.0)]), Pairing::Unmatched);

        // Bounds chosen so the percentages are exact in binary.
        let band = MerchantFeeConfig {
            min_percentage: 25.0,
            max_percentage: 50.0,
        };
        let recon = ReconciliationConfig::default();
        let at = |amount| pair_credit(amount, &[batch(200.0)], |_| true, &recon, &band);
        assert!(matches!(at(150.0), Pairing::MerchantFee { .. }));
        assert!(matches!(at(100.0), Pairing::MerchantFee { .. }));
        assert_eq!(at(99.0), Pairing::Unmatched);
        assert_eq!(at(151.0), Pairing::Unmatched);
    }

    #[test]
    fn zero_total_batches_never_fee_match() {
        assert_eq!(fee_percentage(0.0, 10.0), None);
        assert_eq!(pair(-1.0, &[batch(0.0)]), Pairing::Unmatched);
    }

    #[test]
    fn unavailable_batches_are_skipped() {
        let batches = [batch(54.0), batch(54.0)];
        let pairing = pair_credit(
            54.0,
            &batches,
            |i| i != 0,
            &ReconciliationConfig::default(),
            &MerchantFeeConfig::default(),
        );
        assert_eq!(pairing, Pairing::Exact { batch: 1 });
    }
}
