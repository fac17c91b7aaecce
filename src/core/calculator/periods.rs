//! Week / month / year boundary logic for the cumulative totals.
//!
//! Totals restart when the candidate date falls in a different week (weeks
//! start on Monday), month or year than the reference date, which is the date
//! of the previous record. No wall-clock "today" is involved.

use crate::models::production::Totals;
use chrono::{Datelike, Duration, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeriodReset {
    pub week: bool,
    pub month: bool,
    pub year: bool,
}

pub fn week_start(d: NaiveDate) -> NaiveDate {
    d - Duration::days(d.weekday().num_days_from_monday() as i64)
}

pub fn boundaries(candidate: NaiveDate, reference: NaiveDate) -> PeriodReset {
    PeriodReset {
        week: week_start(candidate) != week_start(reference),
        month: (candidate.year(), candidate.month()) != (reference.year(), reference.month()),
        year: candidate.year() != reference.year(),
    }
}

/// Totals for a record on `date` with `daily`, given the previous record's
/// date and totals (`None` when it is the device's first record).
pub fn next_totals(previous: Option<(NaiveDate, Totals)>, date: NaiveDate, daily: i64) -> Totals {
    let Some((prev_date, prev)) = previous else {
        return Totals {
            weekly: daily,
            monthly: daily,
            yearly: daily,
        };
    };

    let reset = boundaries(date, prev_date);
    let carry = |restart: bool, total: i64| if restart { daily } else { total + daily };

    Totals {
        weekly: carry(reset.week, prev.weekly),
        monthly: carry(reset.month, prev.monthly),
        yearly: carry(reset.year, prev.yearly),
    }
}
