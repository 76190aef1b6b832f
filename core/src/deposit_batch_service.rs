//! Deposit batches: grouping receipts into one bank deposit.
//!
//! RULE: a batch total is the sum of its receipts at creation time and is
//! never recomputed. `reconciled` is owned by manual reconciliation and is
//! independent of the OPEN → DEPOSITED status.

use crate::{
    error::{DeskError, DeskResult},
    event::DeskEvent,
    model::{BatchStatus, DepositBatch, ReceiptStatus},
    sequence::SequenceKind,
    store::DeskStore,
    types::{new_id, EntityId, TenantContext},
};
use chrono::Utc;
use std::collections::HashSet;

pub struct DepositBatchService<'a> {
    store: &'a DeskStore,
    tenant: &'a TenantContext,
}

impl<'a> DepositBatchService<'a> {
    pub fn new(store: &'a DeskStore, tenant: &'a TenantContext) -> Self {
        Self { store, tenant }
    }

    /// Batch the given receipts. Either every receipt flips to BATCHED and
    /// the batch is written, or nothing changes.
    pub fn create_deposit_batch(&self, receipt_ids: &[EntityId]) -> DeskResult<DepositBatch> {
        if receipt_ids.is_empty() {
            return Err(DeskError::invalid_state(
                "cannot create batch: no receipts provided",
            ));
        }

        let mut seen = HashSet::new();
        let mut receipts = Vec::with_capacity(receipt_ids.len());
        for id in receipt_ids {
            if !seen.insert(id.as_str()) {
                return Err(DeskError::invalid_state(format!(
                    "receipt listed twice: {id}"
                )));
            }
            let receipt = self
                .store
                .get_receipt(id)?
                .filter(|r| r.dealership_id == self.tenant.dealership_id)
                .ok_or_else(|| DeskError::not_found("Receipt", id.as_str()))?;
            if receipt.status != ReceiptStatus::Unbatched {
                return Err(DeskError::invalid_state(format!(
                    "receipt already batched: {}",
                    receipt.receipt_number
                )));
            }
            receipts.push(receipt);
        }

        let total: f64 = receipts.iter().map(|r| r.amount).sum();

        let batch = self.store.in_transaction(|store| {
            let now = Utc::now();
            let batch = DepositBatch {
                id: new_id(),
                dealership_id: self.tenant.dealership_id.clone(),
                batch_number: store.allocate_code(SequenceKind::DepositBatch)?,
                receipt_ids: receipt_ids.to_vec(),
                total,
                status: BatchStatus::Open,
                reconciled: false,
                deposited_at: None,
                created_at: now,
                updated_at: now,
            };
            store.insert_deposit_batch(&batch)?;
            for receipt in &receipts {
                store.update_receipt_status(&receipt.id, ReceiptStatus::Batched)?;
            }
            store.append_event(
                &batch.dealership_id,
                &DeskEvent::DepositBatchCreated {
                    batch_id: batch.id.clone(),
                    batch_number: batch.batch_number.clone(),
                    receipt_count: receipts.len(),
                    total,
                },
            )?;
            Ok(batch)
        })?;

        log::info!(
            "Created deposit batch {} with {} receipts, total {:.2}",
            batch.batch_number,
            receipts.len(),
            batch.total
        );
        Ok(batch)
    }

    pub fn mark_deposited(&self, batch_id: &str) -> DeskResult<DepositBatch> {
        let mut batch = self.get_batch(batch_id)?;
        if batch.status == BatchStatus::Deposited {
            return Err(DeskError::invalid_state(format!(
                "batch already deposited: {}",
                batch.batch_number
            )));
        }

        let now = Utc::now();
        self.store.in_transaction(|store| {
            store.mark_batch_deposited(&batch.id, now)?;
            store.append_event(
                &batch.dealership_id,
                &DeskEvent::DepositBatchDeposited {
                    batch_id: batch.id.clone(),
                    batch_number: batch.batch_number.clone(),
                },
            )
        })?;

        log::info!("Marked batch {} as deposited", batch.batch_number);
        batch.status = BatchStatus::Deposited;
        batch.deposited_at = Some(now);
        batch.updated_at = now;
        Ok(batch)
    }

    /// Deposited but not yet reconciled, most recent deposit first.
    pub fn unreconciled_deposited_batches(&self) -> DeskResult<Vec<DepositBatch>> {
        self.store
            .unreconciled_deposited_batches(&self.tenant.dealership_id)
    }

    pub fn list_batches(&self) -> DeskResult<Vec<DepositBatch>> {
        self.store.deposit_batches(&self.tenant.dealership_id)
    }

    pub fn get_batch(&self, batch_id: &str) -> DeskResult<DepositBatch> {
        self.store
            .get_deposit_batch(batch_id)?
            .filter(|b| b.dealership_id == self.tenant.dealership_id)
            .ok_or_else(|| DeskError::not_found("Deposit batch", batch_id))
    }
}
