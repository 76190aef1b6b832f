//! Manual reconciliation: confirming and rejecting pairings.
//!
//! RULE: confirmation is the only path that flips a transaction to MATCHED
//! and a batch to reconciled, and it does both or neither.

use crate::{
    error::{DeskError, DeskResult},
    event::DeskEvent,
    model::{MatchStatus, MatchType, ReconciliationMatch, TxnStatus},
    store::DeskStore,
    types::{new_id, TenantContext},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Optional AI context carried over from a suggestion the user accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmMatch {
    #[serde(default)]
    pub ai_suggested: bool,
    #[serde(default)]
    pub ai_confidence: Option<f64>,
    #[serde(default)]
    pub ai_reasons: Vec<String>,
}

pub struct ReconciliationService<'a> {
    store: &'a DeskStore,
    tenant: &'a TenantContext,
}

impl<'a> ReconciliationService<'a> {
    pub fn new(store: &'a DeskStore, tenant: &'a TenantContext) -> Self {
        Self { store, tenant }
    }

    /// Record a user-confirmed pairing. When the user is accepting a
    /// suggestion, the suggestion's match type is carried over; otherwise
    /// the match is MANUAL. Either way the transaction ends with exactly
    /// one live match: the confirmed one.
    pub fn confirm_match(
        &self,
        bank_transaction_id: &str,
        deposit_batch_id: &str,
        confirm: ConfirmMatch,
    ) -> DeskResult<ReconciliationMatch> {
        let dealership = &self.tenant.dealership_id;

        let txn = self
            .store
            .get_bank_transaction(bank_transaction_id)?
            .filter(|t| &t.dealership_id == dealership)
            .ok_or_else(|| DeskError::not_found("Bank transaction", bank_transaction_id))?;
        if txn.status == TxnStatus::Matched {
            return Err(DeskError::invalid_state(format!(
                "bank transaction already matched: {}",
                txn.transaction_id
            )));
        }

        let batch = self
            .store
            .get_deposit_batch(deposit_batch_id)?
            .filter(|b| &b.dealership_id == dealership)
            .ok_or_else(|| DeskError::not_found("Deposit batch", deposit_batch_id))?;
        if batch.reconciled {
            return Err(DeskError::invalid_state(format!(
                "deposit batch already reconciled: {}",
                batch.batch_number
            )));
        }

        // A pending suggestion for this exact pair becomes the confirmed
        // row; any other suggestion touching either side is rejected.
        let suggestion = self.store.suggestion_for_pair(&txn.id, &batch.id)?;
        let carried = suggestion.as_ref().filter(|_| confirm.ai_suggested);
        let match_type = carried.map_or(MatchType::Manual, |s| s.match_type);
        let confidence = confirm
            .ai_confidence
            .or(carried.map(|s| s.confidence_score))
            .unwrap_or(100.0)
            .clamp(0.0, 100.0);

        let m = ReconciliationMatch {
            id: suggestion.as_ref().map_or_else(new_id, |s| s.id.clone()),
            dealership_id: dealership.clone(),
            bank_transaction_id: txn.id.clone(),
            deposit_batch_id: batch.id.clone(),
            match_type,
            confidence_score: confidence,
            ai_suggested: confirm.ai_suggested,
            ai_reasons: confirm.ai_reasons,
            explanation: carried.and_then(|s| s.explanation.clone()),
            status: MatchStatus::Confirmed,
            user_confirmed: true,
            matched_by: Some(self.tenant.operator.clone()),
            matched_at: Utc::now(),
        };

        let superseded = self.store.in_transaction(|store| {
            if suggestion.is_some() {
                store.update_confirmed_match(&m)?;
            } else {
                store.insert_match(&m)?;
            }
            let superseded = store.reject_open_suggestions(&txn.id, &batch.id, &m.id)?;
            for match_id in &superseded {
                store.append_event(
                    dealership,
                    &DeskEvent::MatchRejected {
                        match_id: match_id.clone(),
                    },
                )?;
            }
            store.update_bank_transaction_status(&txn.id, TxnStatus::Matched)?;
            store.mark_batch_reconciled(&batch.id)?;
            store.append_event(
                dealership,
                &DeskEvent::MatchConfirmed {
                    match_id: m.id.clone(),
                    bank_transaction_id: txn.id.clone(),
                    deposit_batch_id: batch.id.clone(),
                },
            )?;
            Ok(superseded)
        })?;

        if !superseded.is_empty() {
            log::debug!("Rejected {} superseded suggestions", superseded.len());
        }
        log::info!(
            "Match confirmed by {}: bank {} <-> {}",
            self.tenant.operator,
            txn.transaction_id,
            batch.batch_number
        );
        Ok(m)
    }

    /// Only a SUGGESTED match can be rejected.
    pub fn reject_match(&self, match_id: &str) -> DeskResult<ReconciliationMatch> {
        let mut m = self
            .store
            .get_match(match_id)?
            .filter(|m| m.dealership_id == self.tenant.dealership_id)
            .ok_or_else(|| DeskError::not_found("Reconciliation match", match_id))?;
        if m.status != MatchStatus::Suggested {
            return Err(DeskError::invalid_state(format!(
                "only suggested matches can be rejected; {} is {}",
                m.id, m.status
            )));
        }

        self.store.in_transaction(|store| {
            store.update_match_status(&m.id, MatchStatus::Rejected)?;
            store.append_event(
                &m.dealership_id,
                &DeskEvent::MatchRejected {
                    match_id: m.id.clone(),
                },
            )
        })?;

        log::info!("Rejected suggested match {}", m.id);
        m.status = MatchStatus::Rejected;
        Ok(m)
    }

    /// Newest first.
    pub fn list_matches(&self) -> DeskResult<Vec<ReconciliationMatch>> {
        self.store.matches(&self.tenant.dealership_id)
    }

    pub fn ai_suggested_matches(&self) -> DeskResult<Vec<ReconciliationMatch>> {
        self.store
            .ai_suggested_matches(&self.tenant.dealership_id)
    }

    pub fn match_for_transaction(
        &self,
        bank_transaction_id: &str,
    ) -> DeskResult<Option<ReconciliationMatch>> {
        Ok(self
            .store
            .match_for_transaction(bank_transaction_id)?
            .filter(|m| m.dealership_id == self.tenant.dealership_id))
    }

    pub fn match_for_batch(&self, deposit_batch_id: &str) -> DeskResult<Option<ReconciliationMatch>> {
        Ok(self
            .store
            .match_for_batch(deposit_batch_id)?
            .filter(|m| m.dealership_id == self.tenant.dealership_id))
    }
}
