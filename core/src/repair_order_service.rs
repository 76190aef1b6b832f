//! Repair orders: creation, pricing, closing and billing questions.
//!
//! RULE: an order is priced once, at creation. Closing only flips status.

use crate::{
    error::{DeskError, DeskResult},
    event::DeskEvent,
    explain::{Explainer, ExplanationRequest},
    model::{price_line_items, Customer, LineItem, RepairOrder, RoStatus, Vehicle},
    sequence::SequenceKind,
    store::DeskStore,
    types::{new_id, TenantContext},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// What a caller supplies to open a repair order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRepairOrder {
    pub customer: Customer,
    pub vehicle: Vehicle,
    pub line_items: Vec<LineItem>,
}

pub struct RepairOrderService<'a> {
    store: &'a DeskStore,
    tenant: &'a TenantContext,
    tax_rate: f64,
}

impl<'a> RepairOrderService<'a> {
    pub fn new(store: &'a DeskStore, tenant: &'a TenantContext, tax_rate: f64) -> Self {
        Self {
            store,
            tenant,
            tax_rate,
        }
    }

    pub fn create_repair_order(&self, new_ro: NewRepairOrder) -> DeskResult<RepairOrder> {
        let NewRepairOrder {
            customer,
            vehicle,
            mut line_items,
        } = new_ro;

        if let Some(bad) = line_items
            .iter()
            .find(|item| item.quantity < 1 || item.rate < 0.0)
        {
            return Err(DeskError::invalid_state(format!(
                "line item '{}' needs quantity >= 1 and rate >= 0",
                bad.description
            )));
        }

        let (subtotal, tax, total) = price_line_items(&mut line_items, self.tax_rate);

        let ro = self.store.in_transaction(|store| {
            let now = Utc::now();
            let ro = RepairOrder {
                id: new_id(),
                dealership_id: self.tenant.dealership_id.clone(),
                ro_number: store.allocate_code(SequenceKind::RepairOrder)?,
                customer,
                vehicle,
                line_items,
                subtotal,
                tax,
                total,
                status: RoStatus::Open,
                created_at: now,
                updated_at: now,
            };
            store.insert_repair_order(&ro)?;
            store.append_event(
                &ro.dealership_id,
                &DeskEvent::RepairOrderCreated {
                    ro_id: ro.id.clone(),
                    ro_number: ro.ro_number.clone(),
                    total: ro.total,
                },
            )?;
            Ok(ro)
        })?;

        log::info!("Created repair order {} (total {:.2})", ro.ro_number, ro.total);
        Ok(ro)
    }

    pub fn close_repair_order(&self, ro_id: &str) -> DeskResult<RepairOrder> {
        let mut ro = self.get_repair_order(ro_id)?;
        if ro.status == RoStatus::Closed {
            return Err(DeskError::invalid_state(format!(
                "repair order already closed: {}",
                ro.ro_number
            )));
        }

        self.store.in_transaction(|store| {
            store.update_repair_order_status(&ro.id, RoStatus::Closed)?;
            store.append_event(
                &ro.dealership_id,
                &DeskEvent::RepairOrderClosed {
                    ro_id: ro.id.clone(),
                    ro_number: ro.ro_number.clone(),
                },
            )
        })?;

        log::info!("Closed repair order {}", ro.ro_number);
        ro.status = RoStatus::Closed;
        ro.updated_at = Utc::now();
        Ok(ro)
    }

    /// Newest first.
    pub fn list_repair_orders(&self) -> DeskResult<Vec<RepairOrder>> {
        self.store.repair_orders(&self.tenant.dealership_id)
    }

    pub fn repair_orders_by_status(&self, status: RoStatus) -> DeskResult<Vec<RepairOrder>> {
        self.store
            .repair_orders_by_status(&self.tenant.dealership_id, status)
    }

    /// Orders belonging to another dealership are reported as not found.
    pub fn get_repair_order(&self, ro_id: &str) -> DeskResult<RepairOrder> {
        self.store
            .get_repair_order(ro_id)?
            .filter(|ro| ro.dealership_id == self.tenant.dealership_id)
            .ok_or_else(|| DeskError::not_found("Repair order", ro_id))
    }

    /// Draft a customer-facing answer about the charges on an order.
    pub fn answer_billing_question(
        &self,
        ro_id: &str,
        question: &str,
        explainer: &Explainer,
    ) -> DeskResult<String> {
        let ro = self.get_repair_order(ro_id)?;
        let request = ExplanationRequest::BillingDispute {
            ro_details: billing_summary(&ro),
            question: question.to_string(),
        };
        Ok(explainer.explain(&request))
    }
}

/// Plain-text rendering of an order for the billing prompt.
pub fn billing_summary(ro: &RepairOrder) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "RO Number: {}", ro.ro_number);
    let _ = writeln!(out, "Customer: {}", ro.customer.name);
    let _ = writeln!(
        out,
        "Vehicle: {} {} {}",
        ro.vehicle.year, ro.vehicle.make, ro.vehicle.model
    );
    let _ = writeln!(out, "Line Items:");
    for item in &ro.line_items {
        let _ = writeln!(
            out,
            "- {} ({}): {} x ${:.2} = ${:.2}",
            item.description, item.kind, item.quantity, item.rate, item.amount
        );
    }
    let _ = writeln!(out, "Subtotal: ${:.2}", ro.subtotal);
    let _ = writeln!(out, "Tax: ${:.2}", ro.tax);
    let _ = write!(out, "Total: ${:.2}", ro.total);
    out
}
