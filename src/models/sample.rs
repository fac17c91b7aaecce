use crate::utils::date::TS_FORMAT;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One timestamped snapshot of a device's counters and channels.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RawSample {
    pub id: i64,
    pub device_id: i64,
    pub timestamp: NaiveDateTime,
    pub counters: [i64; 4],
    /// Analog channels; index 0 (AIN1) is the power indicator.
    pub analog: [Option<f64>; 4],
    pub digital: [Option<bool>; 4],
}

impl RawSample {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn ts_str(&self) -> String {
        self.timestamp.format(TS_FORMAT).to_string()
    }

    /// Counter by its 1-based slot number. Out of range slots read as 0.
    pub fn counter(&self, slot: u8) -> i64 {
        match slot {
            1..=4 => self.counters[(slot - 1) as usize],
            _ => 0,
        }
    }

    pub fn power_indicator(&self) -> Option<f64> {
        self.analog[0]
    }
}

/// Wire shape of a sample as delivered by the telemetry feed (one JSON object per line).
#[derive(Debug, Clone, Deserialize)]
pub struct SampleInput {
    /// Device name or numeric id.
    pub device: String,
    pub timestamp: String,
    #[serde(default)]
    pub counters: Vec<i64>,
    #[serde(default)]
    pub analog: Vec<Option<f64>>,
    #[serde(default)]
    pub digital: Vec<Option<bool>>,
}

/// A counter reading resolved for one device and one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterReading {
    pub timestamp: NaiveDateTime,
    pub value: i64,
}

impl CounterReading {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}
