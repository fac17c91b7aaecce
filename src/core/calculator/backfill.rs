use chrono::{Duration, NaiveDate};

/// Whether a daily value is too large to be one day of production.
///
/// With trailing history the threshold is `ratio × average`; without usable
/// history (no records, or an average of zero) the absolute `floor` applies.
///
/// The floor is not combined with the ratio. A line averaging 20 a day that
/// goes quiet for three days and then reports 480 must be caught, yet 480 is
/// under the default floor of 500, so with history only the ratio decides
/// (480 > 5 × 20). A busy line averaging 200 may report 600 on a normal day
/// without being flagged.
pub fn is_anomalous(value: i64, trailing_average: Option<f64>, ratio: f64, floor: i64) -> bool {
    match trailing_average {
        Some(avg) if avg > 0.0 => value as f64 > ratio * avg,
        _ => value > floor,
    }
}

/// Spread `total` evenly over the days after `after` up to and including `through`.
///
/// Integer units: the remainder of the division lands on the last day so the
/// shares always sum to `total`. Returns an empty plan when `through <= after`.
pub fn redistribute(total: i64, after: NaiveDate, through: NaiveDate) -> Vec<(NaiveDate, i64)> {
    let days = (through - after).num_days();
    if days <= 0 {
        return Vec::new();
    }

    let total = total.max(0);
    let base = total / days;
    let remainder = total % days;

    (1..=days)
        .map(|i| {
            let day = after + Duration::days(i);
            let share = if i == days { base + remainder } else { base };
            (day, share)
        })
        .collect()
}
