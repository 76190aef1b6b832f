//! Persisted record shapes and their status vocabularies.
//!
//! Status values are stored as the upper-case strings the bank feed and
//! the UI already speak ("UNMATCHED", "DEPOSITED", ...). Each vocabulary is
//! a closed enum that converts to and from that text, including in SQL.

use crate::types::{DealershipId, EntityId};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {} value: {other}", stringify!($name))),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

text_enum!(RoStatus {
    Open => "OPEN",
    Closed => "CLOSED",
});

text_enum!(LineItemKind {
    Labor => "LABOR",
    Part => "PART",
});

text_enum!(ReceiptStatus {
    Unbatched => "UNBATCHED",
    Batched => "BATCHED",
});

text_enum!(BatchStatus {
    Open => "OPEN",
    Deposited => "DEPOSITED",
});

text_enum!(TxnDirection {
    Credit => "CREDIT",
    Debit => "DEBIT",
});

text_enum!(TxnStatus {
    Unmatched => "UNMATCHED",
    Matched => "MATCHED",
});

text_enum!(MatchType {
    ExactMatch => "EXACT_MATCH",
    MerchantFeeMatch => "MERCHANT_FEE_MATCH",
    Manual => "MANUAL",
});

text_enum!(MatchStatus {
    Suggested => "SUGGESTED",
    Confirmed => "CONFIRMED",
    Rejected => "REJECTED",
});

text_enum!(ExceptionType {
    MerchantFee => "MERCHANT_FEE",
    UnmatchedTransaction => "UNMATCHED_TRANSACTION",
    TimingDifference => "TIMING_DIFFERENCE",
});

text_enum!(ExceptionStatus {
    Open => "OPEN",
    Resolved => "RESOLVED",
});

impl TxnDirection {
    /// Positive amounts are credits, everything else a debit.
    pub fn from_amount(amount: f64) -> Self {
        if amount > 0.0 {
            Self::Credit
        } else {
            Self::Debit
        }
    }
}

// ── Repair orders ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(default)]
    pub vin: Option<String>,
    pub year: String,
    pub make: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: LineItemKind,
    pub description: String,
    pub quantity: u32,
    pub rate: f64,
    /// quantity × rate, filled in when the order is priced.
    pub amount: f64,
}

impl LineItem {
    pub fn new(kind: LineItemKind, description: impl Into<String>, quantity: u32, rate: f64) -> Self {
        Self {
            kind,
            description: description.into(),
            quantity,
            rate,
            amount: quantity as f64 * rate,
        }
    }

    pub fn labor(description: impl Into<String>, hours: u32, rate: f64) -> Self {
        Self::new(LineItemKind::Labor, description, hours, rate)
    }

    pub fn part(description: impl Into<String>, quantity: u32, price: f64) -> Self {
        Self::new(LineItemKind::Part, description, quantity, price)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOrder {
    pub id: EntityId,
    pub dealership_id: DealershipId,
    pub ro_number: String,
    pub customer: Customer,
    pub vehicle: Vehicle,
    pub line_items: Vec<LineItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub status: RoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subtotal, tax and total for a set of line items.
/// Line amounts are recomputed from quantity and rate first.
pub fn price_line_items(items: &mut [LineItem], tax_rate: f64) -> (f64, f64, f64) {
    let subtotal: f64 = items
        .iter_mut()
        .map(|item| {
            item.amount = item.quantity as f64 * item.rate;
            item.amount
        })
        .sum();
    let tax = subtotal * tax_rate;
    (subtotal, tax, subtotal + tax)
}

// ── Receipts and deposit batches ──────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: EntityId,
    pub dealership_id: DealershipId,
    pub receipt_number: String,
    pub ro_id: EntityId,
    /// Copied from the repair order for display.
    pub ro_number: String,
    pub amount: f64,
    pub status: ReceiptStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositBatch {
    pub id: EntityId,
    pub dealership_id: DealershipId,
    pub batch_number: String,
    pub receipt_ids: Vec<EntityId>,
    /// Sum of the receipts at creation time. Never recomputed.
    pub total: f64,
    pub status: BatchStatus,
    /// Independent of `status`.
    pub reconciled: bool,
    pub deposited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Bank feed ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: EntityId,
    pub dealership_id: DealershipId,
    /// Identifier assigned by the bank feed. Unique.
    pub transaction_id: String,
    pub date: NaiveDate,
    pub description: String,
    /// Positive = credit, negative = debit.
    pub amount: f64,
    pub direction: TxnDirection,
    pub status: TxnStatus,
    pub created_at: DateTime<Utc>,
}

// ── Reconciliation output ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationMatch {
    pub id: EntityId,
    pub dealership_id: DealershipId,
    pub bank_transaction_id: EntityId,
    pub deposit_batch_id: EntityId,
    pub match_type: MatchType,
    /// 0–100.
    pub confidence_score: f64,
    pub ai_suggested: bool,
    pub ai_reasons: Vec<String>,
    pub explanation: Option<String>,
    pub status: MatchStatus,
    pub user_confirmed: bool,
    pub matched_by: Option<String>,
    pub matched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconException {
    pub id: EntityId,
    pub dealership_id: DealershipId,
    pub exception_number: String,
    pub exception_type: ExceptionType,
    pub description: String,
    pub amount: f64,
    pub bank_transaction_id: Option<EntityId>,
    pub deposit_batch_id: Option<EntityId>,
    pub memo: String,
    pub suggested_gl_account: String,
    pub status: ExceptionStatus,
    pub resolution_notes: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
