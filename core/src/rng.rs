//! Deterministic random numbers for simulated history.
//!
//! RULE: nothing that generates demo or analytics data calls a platform
//! RNG. Every stream is derived from one seed and a stable stream index,
//! so adding a stream never changes the values of an existing one.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct SeededRng {
    inner: Pcg64Mcg,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// An independent stream for one kind of generated data.
    pub fn for_stream(seed: u64, stream: HistoryStream) -> Self {
        Self::new(seed ^ (stream as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15))
    }

    /// Uniform in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform in [0, n). Returns 0 when n is 0.
    pub fn next_below(&mut self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        self.inner.next_u64() % n
    }

    /// Uniform integer in [lo, hi].
    pub fn between(&mut self, lo: u64, hi: u64) -> u64 {
        lo + self.next_below(hi.saturating_sub(lo) + 1)
    }

    /// True with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// Stable stream assignments. Append only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum HistoryStream {
    BankTransactions = 0,
    Exceptions = 1,
}
