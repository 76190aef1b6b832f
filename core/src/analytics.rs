//! Simulated history for the forecasting views.
//!
//! Six months of daily bank credits and monthly exception outcomes, drawn
//! from a seeded stream so the same seed and end date always give the same
//! data.

use crate::{
    model::{ExceptionStatus, TxnDirection},
    rng::{HistoryStream, SeededRng},
};
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

const HISTORY_MONTHS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalTransaction {
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(rename = "type")]
    pub direction: TxnDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalException {
    pub date: NaiveDate,
    pub status: ExceptionStatus,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: f64,
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn history_start(end: NaiveDate) -> NaiveDate {
    end.checked_sub_months(Months::new(HISTORY_MONTHS))
        .unwrap_or(end)
}

/// Daily credits from six months before `end` through `end`.
///
/// Weekdays see 10–24 deposits, weekends 2–6. Each is 50–550, lifted 30%
/// from the 25th of the month and 10% Tuesday to Thursday.
pub fn historical_bank_transactions(end: NaiveDate, seed: u64) -> Vec<HistoricalTransaction> {
    let mut rng = SeededRng::for_stream(seed, HistoryStream::BankTransactions);
    let mut out = Vec::new();

    let mut date = history_start(end);
    while date <= end {
        let weekday = date.weekday().number_from_monday();
        let daily = if weekday <= 5 {
            rng.between(10, 24)
        } else {
            rng.between(2, 6)
        };

        for _ in 0..daily {
            let mut amount = 50.0 + rng.next_f64() * 500.0;
            if date.day() >= 25 {
                amount *= 1.3;
            }
            if (2..=4).contains(&weekday) {
                amount *= 1.1;
            }
            out.push(HistoricalTransaction {
                date,
                amount: round_cents(amount),
                direction: TxnDirection::Credit,
            });
        }
        date += Duration::days(1);
    }

    log::info!("Generated {} historical bank transactions", out.len());
    out
}

/// 15–25 exceptions for each of the six months before `end`. The share
/// resolved starts at 60% and improves by 5 points a month.
pub fn historical_exceptions(end: NaiveDate, seed: u64) -> Vec<HistoricalException> {
    let mut rng = SeededRng::for_stream(seed, HistoryStream::Exceptions);
    let start = history_start(end);
    let mut out = Vec::new();

    for month in 0..HISTORY_MONTHS {
        let month_start = start
            .checked_add_months(Months::new(month))
            .unwrap_or(start);
        let count = rng.between(15, 25);
        let resolution_rate = 0.60 + f64::from(month) * 0.05;

        for _ in 0..count {
            let date = month_start + Duration::days(rng.next_below(28) as i64);
            let status = if rng.chance(resolution_rate) {
                ExceptionStatus::Resolved
            } else {
                ExceptionStatus::Open
            };
            out.push(HistoricalException {
                date,
                status,
                kind: "UNMATCHED".into(),
                amount: round_cents(50.0 + rng.next_f64() * 200.0),
            });
        }
    }

    log::info!("Generated {} historical exceptions", out.len());
    out
}
