//! SQLite-backed store for every back-office record.
//!
//! RULE: Only the store talks to the database.
//! Services call store methods; they never execute SQL directly.
//! Every query that lists or counts records is scoped by dealership.

use crate::{
    error::DeskResult,
    event::{DeskEvent, EventLogEntry},
    sequence::{format_code, next_number, SequenceKind},
};
use chrono::Utc;
use rusqlite::{params, Connection};

mod bank_transaction;
mod deposit_batch;
mod exception;
mod receipt;
mod reconciliation;
mod repair_order;

pub struct DeskStore {
    conn: Connection,
}

impl DeskStore {
    /// Open or create a database file.
    pub fn open(path: &str) -> DeskResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // Ignored by in-memory and shared-cache URIs.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Self::configure(conn)
    }

    /// Private database that disappears with the store.
    pub fn in_memory() -> DeskResult<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> DeskResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Safe to call repeatedly.
    pub fn migrate(&self) -> DeskResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_front_office.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_deposits_and_feed.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_reconciliation.sql"))?;
        Ok(())
    }

    /// Run `f` inside one SQLite transaction. Any error rolls back every
    /// write `f` made. Must not be nested.
    pub(crate) fn in_transaction<T>(
        &self,
        f: impl FnOnce(&Self) -> DeskResult<T>,
    ) -> DeskResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // ── Sequences ──────────────────────────────────────────────

    /// The code the next record of `kind` would receive. Does not consume it.
    pub fn peek_code(&self, kind: SequenceKind) -> DeskResult<String> {
        let existing: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", kind.table()),
            [],
            |row| row.get(0),
        )?;
        let last_issued: i64 = self.conn.query_row(
            "SELECT COALESCE(
                 (SELECT last_value FROM sequence_counter WHERE name = ?1), 0)",
            params![kind.counter_name()],
            |row| row.get(0),
        )?;
        Ok(format_code(
            kind.prefix(),
            next_number(existing as u64, last_issued as u64),
        ))
    }

    /// Consume and return the next code for `kind`.
    ///
    /// The read-modify-write is one UPDATE statement, so concurrent
    /// connections serialise on SQLite's write lock instead of racing.
    pub fn allocate_code(&self, kind: SequenceKind) -> DeskResult<String> {
        self.conn.execute(
            "INSERT OR IGNORE INTO sequence_counter (name, last_value) VALUES (?1, 0)",
            params![kind.counter_name()],
        )?;
        let sql = format!(
            "UPDATE sequence_counter
             SET last_value = MAX(last_value, (SELECT COUNT(*) FROM {})) + 1
             WHERE name = ?1
             RETURNING last_value",
            kind.table()
        );
        let number: i64 = self
            .conn
            .query_row(&sql, params![kind.counter_name()], |row| row.get(0))?;
        Ok(format_code(kind.prefix(), number as u64))
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, dealership_id: &str, event: &DeskEvent) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (dealership_id, event_type, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                dealership_id,
                event.type_name(),
                serde_json::to_string(event)?,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_dealership(&self, dealership_id: &str) -> DeskResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, dealership_id, event_type, payload, recorded_at
             FROM event_log WHERE dealership_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![dealership_id], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    dealership_id: row.get(1)?,
                    event_type: row.get(2)?,
                    payload: row.get(3)?,
                    recorded_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, dealership_id: &str, event_type: &str) -> DeskResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE dealership_id = ?1 AND event_type = ?2",
            params![dealership_id, event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Decode a JSON text column, surfacing bad JSON as a conversion error
/// on that column.
pub(crate) fn json_column<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
