use chrono::NaiveDateTime;
use serde::Serialize;

/// One issued or observed counter reset. The reset command itself is sent by
/// an external scheduler; this row only records its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ResetLog {
    pub id: i64,
    pub device_id: i64,
    pub reset_at: NaiveDateTime,
    pub counter_before: i64,
    pub reason: String,
    pub success: bool,
}
