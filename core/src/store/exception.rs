use super::DeskStore;
use crate::{
    error::DeskResult,
    model::{ExceptionStatus, ReconException},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

const EXCEPTION_COLUMNS: &str = "id, dealership_id, exception_number, exception_type,
                                 description, amount, bank_transaction_id, deposit_batch_id,
                                 memo, suggested_gl_account, status, resolution_notes,
                                 resolved_by, resolved_at, created_at";

fn exception_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReconException> {
    Ok(ReconException {
        id: row.get(0)?,
        dealership_id: row.get(1)?,
        exception_number: row.get(2)?,
        exception_type: row.get(3)?,
        description: row.get(4)?,
        amount: row.get(5)?,
        bank_transaction_id: row.get(6)?,
        deposit_batch_id: row.get(7)?,
        memo: row.get(8)?,
        suggested_gl_account: row.get(9)?,
        status: row.get(10)?,
        resolution_notes: row.get(11)?,
        resolved_by: row.get(12)?,
        resolved_at: row.get(13)?,
        created_at: row.get(14)?,
    })
}

impl DeskStore {
    // ── Exceptions ─────────────────────────────────────────────────

    pub fn insert_exception(&self, e: &ReconException) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO recon_exception (
                id, dealership_id, exception_number, exception_type,
                description, amount, bank_transaction_id, deposit_batch_id,
                memo, suggested_gl_account, status, resolution_notes,
                resolved_by, resolved_at, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                &e.id,
                &e.dealership_id,
                &e.exception_number,
                e.exception_type,
                &e.description,
                e.amount,
                &e.bank_transaction_id,
                &e.deposit_batch_id,
                &e.memo,
                &e.suggested_gl_account,
                e.status,
                &e.resolution_notes,
                &e.resolved_by,
                e.resolved_at,
                e.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_exception(&self, exception_id: &str) -> DeskResult<Option<ReconException>> {
        let e = self
            .conn
            .query_row(
                &format!("SELECT {EXCEPTION_COLUMNS} FROM recon_exception WHERE id = ?1"),
                params![exception_id],
                exception_row_mapper,
            )
            .optional()?;
        Ok(e)
    }

    /// Open exceptions newest first; resolved ones by resolution time, newest first.
    pub fn exceptions_by_status(
        &self,
        dealership_id: &str,
        status: ExceptionStatus,
    ) -> DeskResult<Vec<ReconException>> {
        let order = match status {
            ExceptionStatus::Open => "created_at DESC, rowid DESC",
            ExceptionStatus::Resolved => "resolved_at DESC, rowid DESC",
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EXCEPTION_COLUMNS} FROM recon_exception
             WHERE dealership_id = ?1 AND status = ?2
             ORDER BY {order}"
        ))?;
        let rows = stmt
            .query_map(params![dealership_id, status], exception_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Exceptions raised against a given bank transaction, oldest first.
    pub fn exceptions_for_transaction(&self, txn_id: &str) -> DeskResult<Vec<ReconException>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EXCEPTION_COLUMNS} FROM recon_exception
             WHERE bank_transaction_id = ?1 ORDER BY rowid ASC"
        ))?;
        let rows = stmt
            .query_map(params![txn_id], exception_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn resolve_exception_row(
        &self,
        exception_id: &str,
        notes: &str,
        resolved_by: &str,
        at: DateTime<Utc>,
    ) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE recon_exception
             SET status = ?1, resolution_notes = ?2, resolved_by = ?3, resolved_at = ?4
             WHERE id = ?5",
            params![ExceptionStatus::Resolved, notes, resolved_by, at, exception_id],
        )?;
        Ok(())
    }

    pub fn count_exceptions(&self, dealership_id: &str, status: ExceptionStatus) -> DeskResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM recon_exception WHERE dealership_id = ?1 AND status = ?2",
            params![dealership_id, status],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
