//! Dashboard counts and the close-readiness score.

use crate::{
    error::DeskResult,
    model::{ExceptionStatus, ReceiptStatus, RoStatus, TxnStatus},
    store::DeskStore,
    types::TenantContext,
};
use serde::{Deserialize, Serialize};

const UNBATCHED_RECEIPTS_PENALTY: i32 = 30;
const UNRECONCILED_BATCHES_PENALTY: i32 = 40;
const OPEN_EXCEPTIONS_PENALTY: i32 = 30;

/// Percentage readiness to close the books.
///
/// Each backlog costs a fixed penalty when it is non-empty, whatever its
/// size. The result is clamped to 0..=100.
pub fn close_readiness(unbatched_receipts: u64, unreconciled_batches: u64, open_exceptions: u64) -> u8 {
    let mut score = 100;
    if unbatched_receipts > 0 {
        score -= UNBATCHED_RECEIPTS_PENALTY;
    }
    if unreconciled_batches > 0 {
        score -= UNRECONCILED_BATCHES_PENALTY;
    }
    if open_exceptions > 0 {
        score -= OPEN_EXCEPTIONS_PENALTY;
    }
    score.clamp(0, 100) as u8
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub open_repair_orders: u64,
    pub unbatched_receipts: u64,
    pub unreconciled_batches: u64,
    pub unmatched_bank_transactions: u64,
    pub open_exceptions: u64,
    pub close_readiness_percentage: u8,
}

pub fn dashboard_metrics(store: &DeskStore, tenant: &TenantContext) -> DeskResult<DashboardMetrics> {
    let dealership = &tenant.dealership_id;
    let count = |n: i64| n.max(0) as u64;

    let unbatched_receipts = count(store.count_receipts(dealership, ReceiptStatus::Unbatched)?);
    let unreconciled_batches = count(store.count_unreconciled_batches(dealership)?);
    let open_exceptions = count(store.count_exceptions(dealership, ExceptionStatus::Open)?);

    let metrics = DashboardMetrics {
        open_repair_orders: count(store.count_repair_orders(dealership, RoStatus::Open)?),
        unbatched_receipts,
        unreconciled_batches,
        unmatched_bank_transactions: count(
            store.count_bank_transactions(dealership, TxnStatus::Unmatched)?,
        ),
        open_exceptions,
        close_readiness_percentage: close_readiness(
            unbatched_receipts,
            unreconciled_batches,
            open_exceptions,
        ),
    };
    log::debug!("Dashboard metrics for {dealership}: {metrics:?}");
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn penalties_are_binary_per_backlog() {
        assert_eq!(close_readiness(0, 0, 0), 100);
        assert_eq!(close_readiness(1, 0, 0), 70);
        assert_eq!(close_readiness(0, 1, 0), 60);
        assert_eq!(close_readiness(0, 0, 1), 70);
        assert_eq!(close_readiness(40, 0, 0), 70);
    }

    #[test]
    fn score_never_goes_negative() {
        assert_eq!(close_readiness(5, 5, 5), 0);
        assert_eq!(close_readiness(0, 3, 2), 30);
    }
}
