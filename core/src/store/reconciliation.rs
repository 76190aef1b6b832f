use super::{json_column, DeskStore};
use crate::{
    error::DeskResult,
    model::{MatchStatus, ReconciliationMatch},
};
use rusqlite::{params, OptionalExtension};

const MATCH_COLUMNS: &str = "id, dealership_id, bank_transaction_id, deposit_batch_id,
                             match_type, confidence_score, ai_suggested, ai_reasons,
                             explanation, status, user_confirmed, matched_by, matched_at";

fn match_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReconciliationMatch> {
    Ok(ReconciliationMatch {
        id: row.get(0)?,
        dealership_id: row.get(1)?,
        bank_transaction_id: row.get(2)?,
        deposit_batch_id: row.get(3)?,
        match_type: row.get(4)?,
        confidence_score: row.get(5)?,
        ai_suggested: row.get::<_, i32>(6)? != 0,
        ai_reasons: json_column(row, 7)?,
        explanation: row.get(8)?,
        status: row.get(9)?,
        user_confirmed: row.get::<_, i32>(10)? != 0,
        matched_by: row.get(11)?,
        matched_at: row.get(12)?,
    })
}

impl DeskStore {
    // ── Reconciliation matches ─────────────────────────────────────

    pub fn insert_match(&self, m: &ReconciliationMatch) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO reconciliation_match (
                id, dealership_id, bank_transaction_id, deposit_batch_id,
                match_type, confidence_score, ai_suggested, ai_reasons,
                explanation, status, user_confirmed, matched_by, matched_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                &m.id,
                &m.dealership_id,
                &m.bank_transaction_id,
                &m.deposit_batch_id,
                m.match_type,
                m.confidence_score,
                m.ai_suggested as i32,
                serde_json::to_string(&m.ai_reasons)?,
                &m.explanation,
                m.status,
                m.user_confirmed as i32,
                &m.matched_by,
                m.matched_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_match(&self, match_id: &str) -> DeskResult<Option<ReconciliationMatch>> {
        let m = self
            .conn
            .query_row(
                &format!("SELECT {MATCH_COLUMNS} FROM reconciliation_match WHERE id = ?1"),
                params![match_id],
                match_row_mapper,
            )
            .optional()?;
        Ok(m)
    }

    /// Newest first.
    pub fn matches(&self, dealership_id: &str) -> DeskResult<Vec<ReconciliationMatch>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MATCH_COLUMNS} FROM reconciliation_match
             WHERE dealership_id = ?1
             ORDER BY matched_at DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map(params![dealership_id], match_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn ai_suggested_matches(&self, dealership_id: &str) -> DeskResult<Vec<ReconciliationMatch>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MATCH_COLUMNS} FROM reconciliation_match
             WHERE dealership_id = ?1 AND ai_suggested = 1
             ORDER BY matched_at DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map(params![dealership_id], match_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The confirmed match for a bank transaction, else the earliest
    /// one recorded against it.
    pub fn match_for_transaction(&self, txn_id: &str) -> DeskResult<Option<ReconciliationMatch>> {
        let m = self
            .conn
            .query_row(
                &format!(
                    "SELECT {MATCH_COLUMNS} FROM reconciliation_match
                     WHERE bank_transaction_id = ?1
                     ORDER BY (status = 'CONFIRMED') DESC, rowid ASC
                     LIMIT 1"
                ),
                params![txn_id],
                match_row_mapper,
            )
            .optional()?;
        Ok(m)
    }

    /// The confirmed match for a deposit batch, else the earliest
    /// one recorded against it.
    pub fn match_for_batch(&self, batch_id: &str) -> DeskResult<Option<ReconciliationMatch>> {
        let m = self
            .conn
            .query_row(
                &format!(
                    "SELECT {MATCH_COLUMNS} FROM reconciliation_match
                     WHERE deposit_batch_id = ?1
                     ORDER BY (status = 'CONFIRMED') DESC, rowid ASC
                     LIMIT 1"
                ),
                params![batch_id],
                match_row_mapper,
            )
            .optional()?;
        Ok(m)
    }

    /// The latest SUGGESTED match pairing this transaction with this batch.
    pub fn suggestion_for_pair(
        &self,
        txn_id: &str,
        batch_id: &str,
    ) -> DeskResult<Option<ReconciliationMatch>> {
        let m = self
            .conn
            .query_row(
                &format!(
                    "SELECT {MATCH_COLUMNS} FROM reconciliation_match
                     WHERE bank_transaction_id = ?1 AND deposit_batch_id = ?2 AND status = ?3
                     ORDER BY rowid DESC LIMIT 1"
                ),
                params![txn_id, batch_id, MatchStatus::Suggested],
                match_row_mapper,
            )
            .optional()?;
        Ok(m)
    }

    /// True when any persisted match, in any status, references the batch.
    pub fn batch_has_match(&self, batch_id: &str) -> DeskResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reconciliation_match WHERE deposit_batch_id = ?1",
            params![batch_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn update_match_status(&self, match_id: &str, status: MatchStatus) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE reconciliation_match SET status = ?1 WHERE id = ?2",
            params![status, match_id],
        )?;
        Ok(())
    }

    /// Overwrite a suggestion with its confirmed form. The row keeps its id.
    pub fn update_confirmed_match(&self, m: &ReconciliationMatch) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE reconciliation_match
             SET match_type = ?1, confidence_score = ?2, ai_suggested = ?3,
                 ai_reasons = ?4, explanation = ?5, status = ?6,
                 user_confirmed = ?7, matched_by = ?8, matched_at = ?9
             WHERE id = ?10",
            params![
                m.match_type,
                m.confidence_score,
                m.ai_suggested as i32,
                serde_json::to_string(&m.ai_reasons)?,
                &m.explanation,
                m.status,
                m.user_confirmed as i32,
                &m.matched_by,
                m.matched_at,
                &m.id,
            ],
        )?;
        Ok(())
    }

    /// Reject every still-SUGGESTED match touching the transaction or the
    /// batch, except `keep_id`. Returns the ids rejected.
    pub fn reject_open_suggestions(
        &self,
        txn_id: &str,
        batch_id: &str,
        keep_id: &str,
    ) -> DeskResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "UPDATE reconciliation_match SET status = ?1
             WHERE status = ?2
               AND (bank_transaction_id = ?3 OR deposit_batch_id = ?4)
               AND id != ?5
             RETURNING id",
        )?;
        let ids = stmt
            .query_map(
                params![
                    MatchStatus::Rejected,
                    MatchStatus::Suggested,
                    txn_id,
                    batch_id,
                    keep_id
                ],
                |row| row.get(0),
            )?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    pub fn count_matches(&self, dealership_id: &str) -> DeskResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reconciliation_match WHERE dealership_id = ?1",
            params![dealership_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
