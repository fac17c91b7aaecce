use chrono::NaiveDate;
use serde::Serialize;

/// Provenance of a production record.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// Daily value derived from real samples.
    Sample,
    /// Synthetic day created to fill a telemetry gap.
    Backfill,
    /// Real sample day whose accumulated jump was spread over a gap.
    Redistributed,
}

impl RecordSource {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RecordSource::Sample => "sample",
            RecordSource::Backfill => "backfill",
            RecordSource::Redistributed => "redistributed",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "sample" => Some(RecordSource::Sample),
            "backfill" => Some(RecordSource::Backfill),
            "redistributed" => Some(RecordSource::Redistributed),
            _ => None,
        }
    }
}

/// Which formula produced a daily value.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DailyMethod {
    /// No earlier sample inside the lookback window: the whole counter is attributed to the day.
    FirstReading,
    /// Counter difference against the latest earlier sample.
    Difference,
    /// Counter went backwards; a silent hardware reset is assumed.
    AssumedReset,
    /// A successful reset was logged for the day; the counter is read directly.
    ResetLog,
    /// Share of a redistributed gap.
    Backfill,
}

impl DailyMethod {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            DailyMethod::FirstReading => "first_reading",
            DailyMethod::Difference => "difference",
            DailyMethod::AssumedReset => "assumed_reset",
            DailyMethod::ResetLog => "reset_log",
            DailyMethod::Backfill => "backfill",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "first_reading" => Some(DailyMethod::FirstReading),
            "difference" => Some(DailyMethod::Difference),
            "assumed_reset" => Some(DailyMethod::AssumedReset),
            "reset_log" => Some(DailyMethod::ResetLog),
            "backfill" => Some(DailyMethod::Backfill),
            _ => None,
        }
    }
}

/// Weekly / monthly / yearly running totals.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct Totals {
    pub weekly: i64,
    pub monthly: i64,
    pub yearly: i64,
}

/// One row per (device, calendar day).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductionRecord {
    pub id: i64,
    pub device_id: i64,
    pub date: NaiveDate,
    pub daily: i64,
    pub totals: Totals,
    /// Counter reading the daily value was derived from (0 for synthetic days).
    pub counter_value: i64,
    pub source: RecordSource,
    pub method: DailyMethod,
    pub updated_at: String,
}

impl ProductionRecord {
    pub fn date_str(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}
