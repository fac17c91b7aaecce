use super::DailyQuantity;
use crate::models::production::DailyMethod;
use crate::models::sample::CounterReading;

/// Difference-based daily production.
///
/// - no earlier reading: the whole counter value is attributed to the day
/// - negative difference: a silent hardware reset is assumed and the counter
///   is read directly
/// - otherwise the plain difference
///
/// The result is never negative.
pub fn daily(current: &CounterReading, prior: Option<&CounterReading>) -> DailyQuantity {
    let (quantity, method) = match prior {
        None => (current.value, DailyMethod::FirstReading),
        Some(p) => {
            let delta = current.value - p.value;
            if delta < 0 {
                (current.value, DailyMethod::AssumedReset)
            } else {
                (delta, DailyMethod::Difference)
            }
        }
    };

    DailyQuantity {
        quantity: quantity.max(0),
        method,
        counter_value: current.value,
    }
}
