use super::{DailyQuantity, legacy};
use crate::models::production::DailyMethod;
use crate::models::reset::ResetLog;
use crate::models::sample::CounterReading;

/// Daily production for devices whose counter is zeroed by a reset command.
///
/// On a day with a successful reset the counter has been counting up from
/// zero, so it is read directly. Any other day falls back to the legacy
/// difference.
pub fn daily(
    current: &CounterReading,
    prior: Option<&CounterReading>,
    reset: Option<&ResetLog>,
) -> DailyQuantity {
    match reset {
        Some(r) if r.success => DailyQuantity {
            quantity: current.value.max(0),
            method: DailyMethod::ResetLog,
            counter_value: current.value,
        },
        _ => legacy::daily(current, prior),
    }
}
