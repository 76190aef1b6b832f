//! Receipts issued against closed repair orders.

use crate::{
    error::{DeskError, DeskResult},
    event::DeskEvent,
    model::{Receipt, ReceiptStatus, RoStatus},
    sequence::SequenceKind,
    store::DeskStore,
    types::{new_id, TenantContext},
};
use chrono::Utc;

pub struct ReceiptService<'a> {
    store: &'a DeskStore,
    tenant: &'a TenantContext,
}

impl<'a> ReceiptService<'a> {
    pub fn new(store: &'a DeskStore, tenant: &'a TenantContext) -> Self {
        Self { store, tenant }
    }

    /// One receipt per closed order, for the order's full total.
    pub fn generate_receipt(&self, ro_id: &str) -> DeskResult<Receipt> {
        let ro = self
            .store
            .get_repair_order(ro_id)?
            .filter(|ro| ro.dealership_id == self.tenant.dealership_id)
            .ok_or_else(|| DeskError::not_found("Repair order", ro_id))?;

        if ro.status != RoStatus::Closed {
            return Err(DeskError::invalid_state(format!(
                "repair order must be closed before generating a receipt: {}",
                ro.ro_number
            )));
        }
        if !self.store.receipts_for_ro(&ro.id)?.is_empty() {
            return Err(DeskError::invalid_state(format!(
                "receipt already exists for repair order: {}",
                ro.ro_number
            )));
        }

        let receipt = self.store.in_transaction(|store| {
            let receipt = Receipt {
                id: new_id(),
                dealership_id: ro.dealership_id.clone(),
                receipt_number: store.allocate_code(SequenceKind::Receipt)?,
                ro_id: ro.id.clone(),
                ro_number: ro.ro_number.clone(),
                amount: ro.total,
                status: ReceiptStatus::Unbatched,
                created_at: Utc::now(),
            };
            store.insert_receipt(&receipt)?;
            store.append_event(
                &receipt.dealership_id,
                &DeskEvent::ReceiptGenerated {
                    receipt_id: receipt.id.clone(),
                    receipt_number: receipt.receipt_number.clone(),
                    ro_number: receipt.ro_number.clone(),
                    amount: receipt.amount,
                },
            )?;
            Ok(receipt)
        })?;

        log::info!(
            "Generated receipt {} for {} ({:.2})",
            receipt.receipt_number,
            receipt.ro_number,
            receipt.amount
        );
        Ok(receipt)
    }

    /// Oldest first, the order they would be batched in.
    pub fn unbatched_receipts(&self) -> DeskResult<Vec<Receipt>> {
        self.store
            .receipts_by_status(&self.tenant.dealership_id, ReceiptStatus::Unbatched)
    }

    pub fn list_receipts(&self) -> DeskResult<Vec<Receipt>> {
        self.store.receipts(&self.tenant.dealership_id)
    }

    pub fn get_receipt(&self, receipt_id: &str) -> DeskResult<Receipt> {
        self.store
            .get_receipt(receipt_id)?
            .filter(|r| r.dealership_id == self.tenant.dealership_id)
            .ok_or_else(|| DeskError::not_found("Receipt", receipt_id))
    }
}
