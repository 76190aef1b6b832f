//! The bank feed: imported transactions awaiting reconciliation.

use crate::{
    error::{DeskError, DeskResult},
    event::DeskEvent,
    model::{BankTransaction, TxnDirection, TxnStatus},
    store::DeskStore,
    types::{new_id, TenantContext},
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One line from the upstream bank feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBankTransaction {
    pub transaction_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    /// Derived from the sign of `amount` when absent.
    #[serde(default)]
    pub direction: Option<TxnDirection>,
}

pub struct BankTransactionService<'a> {
    store: &'a DeskStore,
    tenant: &'a TenantContext,
}

impl<'a> BankTransactionService<'a> {
    pub fn new(store: &'a DeskStore, tenant: &'a TenantContext) -> Self {
        Self { store, tenant }
    }

    pub fn import_transaction(&self, new_txn: NewBankTransaction) -> DeskResult<BankTransaction> {
        let txn = self.store.in_transaction(|store| self.insert(store, new_txn))?;
        log::info!(
            "Imported bank transaction {} ({:.2})",
            txn.transaction_id,
            txn.amount
        );
        Ok(txn)
    }

    /// Replace this dealership's feed with the demo feed: two exact
    /// credits, one credit short by a card-processing fee, one unknown
    /// credit and one bank-fee debit. Matches pointing at the old feed are
    /// removed with it.
    pub fn seed_demo_transactions(&self, today: NaiveDate) -> DeskResult<Vec<BankTransaction>> {
        let feed = [
            ("BANK-TXN-001", 1, "Cash Deposit - Batch 001", 54.00),
            ("BANK-TXN-002", 2, "Cash Deposit - Batch 002", 108.00),
            ("BANK-TXN-003", 1, "Credit Card Deposit - Merchant Services", 485.50),
            ("BANK-TXN-004", 3, "Unknown Wire Transfer", 250.00),
            ("BANK-TXN-005", 1, "Monthly Service Fee", -25.00),
        ];

        let seeded = self.store.in_transaction(|store| {
            let removed = store.delete_bank_transactions(&self.tenant.dealership_id)?;
            log::debug!("Removed {removed} existing bank transactions");
            feed.iter()
                .map(|(id, days_ago, description, amount)| {
                    self.insert(
                        store,
                        NewBankTransaction {
                            transaction_id: (*id).to_string(),
                            date: today - Duration::days(*days_ago),
                            description: (*description).to_string(),
                            amount: *amount,
                            direction: None,
                        },
                    )
                })
                .collect::<DeskResult<Vec<_>>>()
        })?;

        log::info!("Seeded {} demo bank transactions", seeded.len());
        Ok(seeded)
    }

    /// Newest first.
    pub fn unmatched_transactions(&self) -> DeskResult<Vec<BankTransaction>> {
        self.store
            .bank_transactions_by_status(&self.tenant.dealership_id, TxnStatus::Unmatched)
    }

    pub fn list_transactions(&self) -> DeskResult<Vec<BankTransaction>> {
        self.store.bank_transactions(&self.tenant.dealership_id)
    }

    pub fn get_transaction(&self, txn_id: &str) -> DeskResult<BankTransaction> {
        self.store
            .get_bank_transaction(txn_id)?
            .filter(|t| t.dealership_id == self.tenant.dealership_id)
            .ok_or_else(|| DeskError::not_found("Bank transaction", txn_id))
    }

    fn insert(&self, store: &DeskStore, new_txn: NewBankTransaction) -> DeskResult<BankTransaction> {
        if store.bank_transaction_exists(&self.tenant.dealership_id, &new_txn.transaction_id)? {
            return Err(DeskError::invalid_state(format!(
                "bank transaction already imported: {}",
                new_txn.transaction_id
            )));
        }

        let txn = BankTransaction {
            id: new_id(),
            dealership_id: self.tenant.dealership_id.clone(),
            direction: new_txn
                .direction
                .unwrap_or_else(|| TxnDirection::from_amount(new_txn.amount)),
            transaction_id: new_txn.transaction_id,
            date: new_txn.date,
            description: new_txn.description,
            amount: new_txn.amount,
            status: TxnStatus::Unmatched,
            created_at: Utc::now(),
        };
        store.insert_bank_transaction(&txn)?;
        store.append_event(
            &txn.dealership_id,
            &DeskEvent::BankTransactionImported {
                txn_id: txn.id.clone(),
                transaction_id: txn.transaction_id.clone(),
                amount: txn.amount,
            },
        )?;
        Ok(txn)
    }
}
