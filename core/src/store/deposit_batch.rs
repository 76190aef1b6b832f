use super::{json_column, DeskStore};
use crate::{
    error::DeskResult,
    model::{BatchStatus, DepositBatch},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

const BATCH_COLUMNS: &str = "id, dealership_id, batch_number, receipt_ids, total, status,
                             reconciled, deposited_at, created_at, updated_at";

fn batch_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<DepositBatch> {
    Ok(DepositBatch {
        id: row.get(0)?,
        dealership_id: row.get(1)?,
        batch_number: row.get(2)?,
        receipt_ids: json_column(row, 3)?,
        total: row.get(4)?,
        status: row.get(5)?,
        reconciled: row.get::<_, i32>(6)? != 0,
        deposited_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl DeskStore {
    // ── Deposit batch ──────────────────────────────────────────────

    pub fn insert_deposit_batch(&self, b: &DepositBatch) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO deposit_batch (
                id, dealership_id, batch_number, receipt_ids, total, status,
                reconciled, deposited_at, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &b.id,
                &b.dealership_id,
                &b.batch_number,
                serde_json::to_string(&b.receipt_ids)?,
                b.total,
                b.status,
                if b.reconciled { 1i32 } else { 0i32 },
                b.deposited_at,
                b.created_at,
                b.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_deposit_batch(&self, batch_id: &str) -> DeskResult<Option<DepositBatch>> {
        let batch = self
            .conn
            .query_row(
                &format!("SELECT {BATCH_COLUMNS} FROM deposit_batch WHERE id = ?1"),
                params![batch_id],
                batch_row_mapper,
            )
            .optional()?;
        Ok(batch)
    }

    pub fn deposit_batches(&self, dealership_id: &str) -> DeskResult<Vec<DepositBatch>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BATCH_COLUMNS} FROM deposit_batch
             WHERE dealership_id = ?1 ORDER BY rowid ASC"
        ))?;
        let rows = stmt
            .query_map(params![dealership_id], batch_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every batch with reconciled = false, whatever its deposit status.
    /// This is the candidate pool for a reconciliation run.
    pub fn unreconciled_batches(&self, dealership_id: &str) -> DeskResult<Vec<DepositBatch>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BATCH_COLUMNS} FROM deposit_batch
             WHERE dealership_id = ?1 AND reconciled = 0
             ORDER BY rowid ASC"
        ))?;
        let rows = stmt
            .query_map(params![dealership_id], batch_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Deposited but not yet reconciled, most recent deposit first.
    pub fn unreconciled_deposited_batches(
        &self,
        dealership_id: &str,
    ) -> DeskResult<Vec<DepositBatch>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BATCH_COLUMNS} FROM deposit_batch
             WHERE dealership_id = ?1 AND status = ?2 AND reconciled = 0
             ORDER BY deposited_at DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map(
                params![dealership_id, BatchStatus::Deposited],
                batch_row_mapper,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn mark_batch_deposited(&self, batch_id: &str, at: DateTime<Utc>) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE deposit_batch SET status = ?1, deposited_at = ?2, updated_at = ?2
             WHERE id = ?3",
            params![BatchStatus::Deposited, at, batch_id],
        )?;
        Ok(())
    }

    pub fn mark_batch_reconciled(&self, batch_id: &str) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE deposit_batch SET reconciled = 1, updated_at = ?1 WHERE id = ?2",
            params![Utc::now(), batch_id],
        )?;
        Ok(())
    }

    pub fn count_unreconciled_batches(&self, dealership_id: &str) -> DeskResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM deposit_batch WHERE dealership_id = ?1 AND reconciled = 0",
            params![dealership_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
