use super::sample::RawSample;
use serde::Serialize;

/// Which formula a device uses to turn its counter into daily production.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMode {
    #[default]
    Legacy,
    ResetAware,
}

impl CalculationMode {
    /// Convert enum → DB string
    pub fn to_db_str(&self) -> &'static str {
        match self {
            CalculationMode::Legacy => "legacy",
            CalculationMode::ResetAware => "reset_aware",
        }
    }

    /// Convert DB string → enum
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "legacy" => Some(CalculationMode::Legacy),
            "reset_aware" => Some(CalculationMode::ResetAware),
            _ => None,
        }
    }

    /// Helper: accept CLI spellings such as `reset-aware` or `RESET_AWARE`.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::from_db_str(&code.to_lowercase().replace('-', "_"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub factory_id: i64,
    pub selected_counter: u8, // 1..=4
    pub calculation_mode: CalculationMode,
    pub power_threshold: f64,
    pub created_at: String,
}

impl Device {
    /// Value of the counter that represents production for this device.
    pub fn counter_of(&self, sample: &RawSample) -> i64 {
        sample.counter(self.selected_counter)
    }

    pub fn has_power(&self, indicator: f64) -> bool {
        indicator > self.power_threshold
    }
}
