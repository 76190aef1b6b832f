use super::DeskStore;
use crate::{
    error::DeskResult,
    model::{BankTransaction, TxnDirection, TxnStatus},
};
use rusqlite::{params, OptionalExtension};

const TXN_COLUMNS: &str =
    "id, dealership_id, transaction_id, date, description, amount, direction, status, created_at";

fn txn_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<BankTransaction> {
    Ok(BankTransaction {
        id: row.get(0)?,
        dealership_id: row.get(1)?,
        transaction_id: row.get(2)?,
        date: row.get(3)?,
        description: row.get(4)?,
        amount: row.get(5)?,
        direction: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl DeskStore {
    // ── Bank feed ──────────────────────────────────────────────────

    pub fn insert_bank_transaction(&self, t: &BankTransaction) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO bank_transaction (
                id, dealership_id, transaction_id, date, description,
                amount, direction, status, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &t.id,
                &t.dealership_id,
                &t.transaction_id,
                t.date,
                &t.description,
                t.amount,
                t.direction,
                t.status,
                t.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_bank_transaction(&self, txn_id: &str) -> DeskResult<Option<BankTransaction>> {
        let txn = self
            .conn
            .query_row(
                &format!("SELECT {TXN_COLUMNS} FROM bank_transaction WHERE id = ?1"),
                params![txn_id],
                txn_row_mapper,
            )
            .optional()?;
        Ok(txn)
    }

    /// Feed ids are unique per dealership, not globally.
    pub fn bank_transaction_exists(
        &self,
        dealership_id: &str,
        transaction_id: &str,
    ) -> DeskResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM bank_transaction
             WHERE dealership_id = ?1 AND transaction_id = ?2",
            params![dealership_id, transaction_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn bank_transactions(&self, dealership_id: &str) -> DeskResult<Vec<BankTransaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM bank_transaction
             WHERE dealership_id = ?1 ORDER BY rowid ASC"
        ))?;
        let rows = stmt
            .query_map(params![dealership_id], txn_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Newest first.
    pub fn bank_transactions_by_status(
        &self,
        dealership_id: &str,
        status: TxnStatus,
    ) -> DeskResult<Vec<BankTransaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM bank_transaction
             WHERE dealership_id = ?1 AND status = ?2
             ORDER BY date DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map(params![dealership_id, status], txn_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Feed order (insertion order); the matcher treats it as arbitrary.
    pub fn bank_transactions_by_status_and_direction(
        &self,
        dealership_id: &str,
        status: TxnStatus,
        direction: TxnDirection,
    ) -> DeskResult<Vec<BankTransaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM bank_transaction
             WHERE dealership_id = ?1 AND status = ?2 AND direction = ?3
             ORDER BY rowid ASC"
        ))?;
        let rows = stmt
            .query_map(params![dealership_id, status, direction], txn_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_bank_transaction_status(&self, txn_id: &str, status: TxnStatus) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE bank_transaction SET status = ?1 WHERE id = ?2",
            params![status, txn_id],
        )?;
        Ok(())
    }

    pub fn count_bank_transactions(&self, dealership_id: &str, status: TxnStatus) -> DeskResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM bank_transaction WHERE dealership_id = ?1 AND status = ?2",
            params![dealership_id, status],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Remove a dealership's whole feed, together with any matches that
    /// point at it. Returns the number of transactions removed.
    pub fn delete_bank_transactions(&self, dealership_id: &str) -> DeskResult<usize> {
        self.conn.execute(
            "DELETE FROM reconciliation_match
             WHERE bank_transaction_id IN
                   (SELECT id FROM bank_transaction WHERE dealership_id = ?1)",
            params![dealership_id],
        )?;
        let removed = self.conn.execute(
            "DELETE FROM bank_transaction WHERE dealership_id = ?1",
            params![dealership_id],
        )?;
        Ok(removed)
    }
}
