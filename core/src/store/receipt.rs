use super::DeskStore;
use crate::{
    error::DeskResult,
    model::{Receipt, ReceiptStatus},
};
use rusqlite::{params, OptionalExtension};

const RECEIPT_COLUMNS: &str =
    "id, dealership_id, receipt_number, ro_id, ro_number, amount, status, created_at";

fn receipt_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<Receipt> {
    Ok(Receipt {
        id: row.get(0)?,
        dealership_id: row.get(1)?,
        receipt_number: row.get(2)?,
        ro_id: row.get(3)?,
        ro_number: row.get(4)?,
        amount: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl DeskStore {
    // ── Receipt ────────────────────────────────────────────────────

    pub fn insert_receipt(&self, r: &Receipt) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO receipt (
                id, dealership_id, receipt_number, ro_id, ro_number, amount, status, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &r.id,
                &r.dealership_id,
                &r.receipt_number,
                &r.ro_id,
                &r.ro_number,
                r.amount,
                r.status,
                r.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_receipt(&self, receipt_id: &str) -> DeskResult<Option<Receipt>> {
        let receipt = self
            .conn
            .query_row(
                &format!("SELECT {RECEIPT_COLUMNS} FROM receipt WHERE id = ?1"),
                params![receipt_id],
                receipt_row_mapper,
            )
            .optional()?;
        Ok(receipt)
    }

    pub fn receipts_for_ro(&self, ro_id: &str) -> DeskResult<Vec<Receipt>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipt WHERE ro_id = ?1 ORDER BY rowid ASC"
        ))?;
        let rows = stmt
            .query_map(params![ro_id], receipt_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn receipts(&self, dealership_id: &str) -> DeskResult<Vec<Receipt>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipt WHERE dealership_id = ?1 ORDER BY rowid ASC"
        ))?;
        let rows = stmt
            .query_map(params![dealership_id], receipt_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Oldest first, so batches pick up receipts in the order they were taken.
    pub fn receipts_by_status(
        &self,
        dealership_id: &str,
        status: ReceiptStatus,
    ) -> DeskResult<Vec<Receipt>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipt
             WHERE dealership_id = ?1 AND status = ?2
             ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt
            .query_map(params![dealership_id, status], receipt_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_receipt_status(&self, receipt_id: &str, status: ReceiptStatus) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE receipt SET status = ?1 WHERE id = ?2",
            params![status, receipt_id],
        )?;
        Ok(())
    }

    pub fn count_receipts(&self, dealership_id: &str, status: ReceiptStatus) -> DeskResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM receipt WHERE dealership_id = ?1 AND status = ?2",
            params![dealership_id, status],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
