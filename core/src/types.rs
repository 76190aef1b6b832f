//! Shared primitive types used across the back office.

use serde::{Deserialize, Serialize};

/// A stable, unique identifier for any stored record (uuid v4 string).
pub type EntityId = String;

/// The dealership a record belongs to.
pub type DealershipId = String;

/// Who is acting and on behalf of which dealership.
///
/// Every store query and service call is scoped by this value; nothing in
/// the library assumes a fixed dealership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub dealership_id: DealershipId,
    /// Recorded as `matched_by` / `resolved_by` on manual actions.
    pub operator: String,
}

impl TenantContext {
    pub fn new(dealership_id: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            dealership_id: dealership_id.into(),
            operator: operator.into(),
        }
    }
}

/// Generate a fresh record id.
pub fn new_id() -> EntityId {
    uuid::Uuid::new_v4().to_string()
}
