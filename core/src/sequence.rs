//! Human-readable sequential codes: RO-001, RCT-001, BATCH-001, EXC-001.
//!
//! The next number for a collection is (records already in it) + 1.
//! Reading it is side-effect free; `DeskStore::allocate_code` is the only
//! path that consumes a number, and it does so in a single atomic update of
//! the `sequence_counter` row so two writers cannot both receive the same
//! code. Numbers are never reused or gap-filled.

/// A collection that hands out sequential codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    RepairOrder,
    Receipt,
    DepositBatch,
    Exception,
}

impl SequenceKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::RepairOrder => "RO",
            Self::Receipt => "RCT",
            Self::DepositBatch => "BATCH",
            Self::Exception => "EXC",
        }
    }

    /// Table whose cardinality seeds the sequence.
    pub(crate) fn table(&self) -> &'static str {
        match self {
            Self::RepairOrder => "repair_order",
            Self::Receipt => "receipt",
            Self::DepositBatch => "deposit_batch",
            Self::Exception => "recon_exception",
        }
    }

    /// Key of this kind's row in `sequence_counter`.
    pub(crate) fn counter_name(&self) -> &'static str {
        self.table()
    }
}

/// `prefix-NNN`, zero-padded to three digits (wider once past 999).
pub fn format_code(prefix: &str, number: u64) -> String {
    format!("{prefix}-{number:03}")
}

/// Next number given how many records exist and the last number issued.
pub fn next_number(existing_records: u64, last_issued: u64) -> u64 {
    existing_records.max(last_issued) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_zero_padded() {
        assert_eq!(format_code("BATCH", 1), "BATCH-001");
        assert_eq!(format_code("EXC", 42), "EXC-042");
        assert_eq!(format_code("RO", 1000), "RO-1000");
    }

    #[test]
    fn next_number_follows_record_count() {
        assert_eq!(next_number(0, 0), 1);
        assert_eq!(next_number(7, 0), 8);
        assert_eq!(next_number(7, 7), 8);
    }

    #[test]
    fn issued_numbers_are_not_reused_after_deletes() {
        // Five issued, two deleted: the count drops, the counter does not.
        assert_eq!(next_number(3, 5), 6);
    }
}
