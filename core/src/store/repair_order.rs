use super::{json_column, DeskStore};
use crate::{
    error::DeskResult,
    model::{RepairOrder, RoStatus},
};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

const RO_COLUMNS: &str = "id, dealership_id, ro_number, customer, vehicle, line_items,
                          subtotal, tax, total, status, created_at, updated_at";

fn repair_order_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<RepairOrder> {
    Ok(RepairOrder {
        id: row.get(0)?,
        dealership_id: row.get(1)?,
        ro_number: row.get(2)?,
        customer: json_column(row, 3)?,
        vehicle: json_column(row, 4)?,
        line_items: json_column(row, 5)?,
        subtotal: row.get(6)?,
        tax: row.get(7)?,
        total: row.get(8)?,
        status: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl DeskStore {
    // ── Repair order ───────────────────────────────────────────────

    pub fn insert_repair_order(&self, ro: &RepairOrder) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO repair_order (
                id, dealership_id, ro_number, customer, vehicle, line_items,
                subtotal, tax, total, status, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                &ro.id,
                &ro.dealership_id,
                &ro.ro_number,
                serde_json::to_string(&ro.customer)?,
                serde_json::to_string(&ro.vehicle)?,
                serde_json::to_string(&ro.line_items)?,
                ro.subtotal,
                ro.tax,
                ro.total,
                ro.status,
                ro.created_at,
                ro.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_repair_order(&self, ro_id: &str) -> DeskResult<Option<RepairOrder>> {
        let ro = self
            .conn
            .query_row(
                &format!("SELECT {RO_COLUMNS} FROM repair_order WHERE id = ?1"),
                params![ro_id],
                repair_order_row_mapper,
            )
            .optional()?;
        Ok(ro)
    }

    /// Newest first.
    pub fn repair_orders(&self, dealership_id: &str) -> DeskResult<Vec<RepairOrder>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RO_COLUMNS} FROM repair_order
             WHERE dealership_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map(params![dealership_id], repair_order_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn repair_orders_by_status(
        &self,
        dealership_id: &str,
        status: RoStatus,
    ) -> DeskResult<Vec<RepairOrder>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RO_COLUMNS} FROM repair_order
             WHERE dealership_id = ?1 AND status = ?2
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map(params![dealership_id, status], repair_order_row_mapper)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update_repair_order_status(&self, ro_id: &str, status: RoStatus) -> DeskResult<()> {
        self.conn.execute(
            "UPDATE repair_order SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, Utc::now(), ro_id],
        )?;
        Ok(())
    }

    pub fn count_repair_orders(&self, dealership_id: &str, status: RoStatus) -> DeskResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM repair_order WHERE dealership_id = ?1 AND status = ?2",
            params![dealership_id, status],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
