//! Audit events.
//!
//! RULE: every state change made through a service appends exactly one
//! event to the `event_log` table. Variants are appended, never reordered.

use crate::model::{ExceptionType, MatchType};
use crate::types::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeskEvent {
    // ── Front office ───────────────────────────────
    RepairOrderCreated {
        ro_id: EntityId,
        ro_number: String,
        total: f64,
    },
    RepairOrderClosed {
        ro_id: EntityId,
        ro_number: String,
    },
    ReceiptGenerated {
        receipt_id: EntityId,
        receipt_number: String,
        ro_number: String,
        amount: f64,
    },

    // ── Deposits ───────────────────────────────────
    DepositBatchCreated {
        batch_id: EntityId,
        batch_number: String,
        receipt_count: usize,
        total: f64,
    },
    DepositBatchDeposited {
        batch_id: EntityId,
        batch_number: String,
    },

    // ── Bank feed ──────────────────────────────────
    BankTransactionImported {
        txn_id: EntityId,
        transaction_id: String,
        amount: f64,
    },

    // ── Reconciliation ─────────────────────────────
    ReconciliationStarted {
        transactions: usize,
        batches: usize,
    },
    MatchSuggested {
        match_id: EntityId,
        bank_transaction_id: EntityId,
        deposit_batch_id: EntityId,
        match_type: MatchType,
        confidence: f64,
    },
    MatchConfirmed {
        match_id: EntityId,
        bank_transaction_id: EntityId,
        deposit_batch_id: EntityId,
    },
    MatchRejected {
        match_id: EntityId,
    },
    ExceptionRaised {
        exception_id: EntityId,
        exception_number: String,
        exception_type: ExceptionType,
        amount: f64,
    },
    ExceptionResolved {
        exception_id: EntityId,
        exception_number: String,
    },
    ReconciliationCompleted {
        matches_created: usize,
        exceptions_created: usize,
    },
}

impl DeskEvent {
    /// Stable name for the `event_type` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RepairOrderCreated { .. } => "repair_order_created",
            Self::RepairOrderClosed { .. } => "repair_order_closed",
            Self::ReceiptGenerated { .. } => "receipt_generated",
            Self::DepositBatchCreated { .. } => "deposit_batch_created",
            Self::DepositBatchDeposited { .. } => "deposit_batch_deposited",
            Self::BankTransactionImported { .. } => "bank_transaction_imported",
            Self::ReconciliationStarted { .. } => "reconciliation_started",
            Self::MatchSuggested { .. } => "match_suggested",
            Self::MatchConfirmed { .. } => "match_confirmed",
            Self::MatchRejected { .. } => "match_rejected",
            Self::ExceptionRaised { .. } => "exception_raised",
            Self::ExceptionResolved { .. } => "exception_resolved",
            Self::ReconciliationCompleted { .. } => "reconciliation_completed",
        }
    }
}

/// One row of the `event_log` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub dealership_id: String,
    pub event_type: String,
    pub payload: String,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}
