//! Reconciliation exceptions: discrepancies awaiting human review.

use crate::{
    error::{DeskError, DeskResult},
    event::DeskEvent,
    model::{ExceptionStatus, ExceptionType, ReconException},
    sequence::SequenceKind,
    store::DeskStore,
    types::{new_id, EntityId, TenantContext},
};
use chrono::Utc;

#[derive(Debug, Clone)]
pub struct NewException {
    pub exception_type: ExceptionType,
    pub description: String,
    pub amount: f64,
    pub bank_transaction_id: Option<EntityId>,
    pub deposit_batch_id: Option<EntityId>,
    pub memo: String,
    pub suggested_gl_account: String,
}

pub struct ExceptionService<'a> {
    store: &'a DeskStore,
    tenant: &'a TenantContext,
}

impl<'a> ExceptionService<'a> {
    pub fn new(store: &'a DeskStore, tenant: &'a TenantContext) -> Self {
        Self { store, tenant }
    }

    pub fn create_exception(&self, new_exc: NewException) -> DeskResult<ReconException> {
        let exception = self.store.in_transaction(|store| {
            let exception = ReconException {
                id: new_id(),
                dealership_id: self.tenant.dealership_id.clone(),
                exception_number: store.allocate_code(SequenceKind::Exception)?,
                exception_type: new_exc.exception_type,
                description: new_exc.description,
                amount: new_exc.amount,
                bank_transaction_id: new_exc.bank_transaction_id,
                deposit_batch_id: new_exc.deposit_batch_id,
                memo: new_exc.memo,
                suggested_gl_account: new_exc.suggested_gl_account,
                status: ExceptionStatus::Open,
                resolution_notes: None,
                resolved_by: None,
                resolved_at: None,
                created_at: Utc::now(),
            };
            store.insert_exception(&exception)?;
            store.append_event(
                &exception.dealership_id,
                &DeskEvent::ExceptionRaised {
                    exception_id: exception.id.clone(),
                    exception_number: exception.exception_number.clone(),
                    exception_type: exception.exception_type,
                    amount: exception.amount,
                },
            )?;
            Ok(exception)
        })?;

        log::info!(
            "Created exception {} ({}, {:.2})",
            exception.exception_number,
            exception.exception_type,
            exception.amount
        );
        Ok(exception)
    }

    /// Newest first.
    pub fn open_exceptions(&self) -> DeskResult<Vec<ReconException>> {
        self.store
            .exceptions_by_status(&self.tenant.dealership_id, ExceptionStatus::Open)
    }

    /// Most recently resolved first.
    pub fn resolved_exceptions(&self) -> DeskResult<Vec<ReconException>> {
        self.store
            .exceptions_by_status(&self.tenant.dealership_id, ExceptionStatus::Resolved)
    }

    pub fn get_exception(&self, exception_id: &str) -> DeskResult<Option<ReconException>> {
        Ok(self
            .store
            .get_exception(exception_id)?
            .filter(|e| e.dealership_id == self.tenant.dealership_id))
    }

    pub fn resolve_exception(&self, exception_id: &str, notes: &str) -> DeskResult<ReconException> {
        let mut exception = self
            .get_exception(exception_id)?
            .ok_or_else(|| DeskError::not_found("Exception", exception_id))?;
        if exception.status == ExceptionStatus::Resolved {
            return Err(DeskError::invalid_state(format!(
                "exception already resolved: {}",
                exception.exception_number
            )));
        }

        let now = Utc::now();
        self.store.in_transaction(|store| {
            store.resolve_exception_row(&exception.id, notes, &self.tenant.operator, now)?;
            store.append_event(
                &exception.dealership_id,
                &DeskEvent::ExceptionResolved {
                    exception_id: exception.id.clone(),
                    exception_number: exception.exception_number.clone(),
                },
            )
        })?;

        log::info!(
            "Resolved exception {} by {}",
            exception.exception_number,
            self.tenant.operator
        );
        exception.status = ExceptionStatus::Resolved;
        exception.resolution_notes = Some(notes.to_string());
        exception.resolved_by = Some(self.tenant.operator.clone());
        exception.resolved_at = Some(now);
        Ok(exception)
    }

    pub fn count_open_exceptions(&self) -> DeskResult<i64> {
        self.store
            .count_exceptions(&self.tenant.dealership_id, ExceptionStatus::Open)
    }
}
