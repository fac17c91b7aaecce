use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Approved,
    InProcess,
    Paused,
    Stopped,
    Completed,
    Rejected,
}

impl BatchStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Approved => "approved",
            BatchStatus::InProcess => "in_process",
            BatchStatus::Paused => "paused",
            BatchStatus::Stopped => "stopped",
            BatchStatus::Completed => "completed",
            BatchStatus::Rejected => "rejected",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BatchStatus::Pending),
            "approved" => Some(BatchStatus::Approved),
            "in_process" => Some(BatchStatus::InProcess),
            "paused" => Some(BatchStatus::Paused),
            "stopped" => Some(BatchStatus::Stopped),
            "completed" => Some(BatchStatus::Completed),
            "rejected" => Some(BatchStatus::Rejected),
            _ => None,
        }
    }

    /// Auto-completion never overrides these.
    pub fn blocks_completion(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Stopped)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Batch {
    pub id: i64,
    pub name: String,
    pub factory_id: i64,
    pub start_date: NaiveDateTime,
    pub start_value: i64,
    /// Counter delta accumulated since the batch started.
    pub current_value: i64,
    /// Tons.
    pub expected_output: f64,
    /// Tons.
    pub actual_output: f64,
    pub waste_factor: f64,
    pub status: BatchStatus,
    pub is_completed: bool,
    pub completed_at: Option<NaiveDateTime>,
}

/// Where a progress figure came from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    RawSamples,
    ProductionRecords,
    Mixed,
    None,
}

impl DataSource {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            DataSource::RawSamples => "raw_samples",
            DataSource::ProductionRecords => "production_records",
            DataSource::Mixed => "mixed",
            DataSource::None => "none",
        }
    }

    /// Fold per-device sources into the overall indicator.
    pub fn combine(self, other: DataSource) -> DataSource {
        match (self, other) {
            (DataSource::None, x) | (x, DataSource::None) => x,
            (a, b) if a == b => a,
            _ => DataSource::Mixed,
        }
    }
}
