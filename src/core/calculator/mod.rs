//! Pure daily-production formulas. Nothing in here touches storage or the clock.

pub mod backfill;
pub mod legacy;
pub mod periods;
pub mod reset_aware;

use crate::models::device::CalculationMode;
use crate::models::production::DailyMethod;
use crate::models::reset::ResetLog;
use crate::models::sample::CounterReading;
use serde::Serialize;

/// Everything a formula needs to produce one day's quantity.
#[derive(Debug, Clone)]
pub struct DailyInputs {
    /// Latest reading on the day being computed.
    pub current: CounterReading,
    /// Latest reading before that day, inside the lookback window.
    pub prior: Option<CounterReading>,
    /// Successful reset logged on the day, if any.
    pub reset: Option<ResetLog>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyQuantity {
    pub quantity: i64,
    pub method: DailyMethod,
    pub counter_value: i64,
}

/// Dispatch on the device's calculation mode.
pub fn compute_daily(mode: CalculationMode, inputs: &DailyInputs) -> DailyQuantity {
    match mode {
        CalculationMode::Legacy => legacy::daily(&inputs.current, inputs.prior.as_ref()),
        CalculationMode::ResetAware => reset_aware::daily(
            &inputs.current,
            inputs.prior.as_ref(),
            inputs.reset.as_ref(),
        ),
    }
}
