use chrono::NaiveDateTime;
use serde::Serialize;

/// The single live power row of a device.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PowerStatus {
    pub device_id: i64,
    pub has_power: bool,
    pub last_value: Option<f64>,
    pub last_checked_at: NaiveDateTime,
    pub power_loss_detected_at: Option<NaiveDateTime>,
    pub power_restored_at: Option<NaiveDateTime>,
    pub threshold: f64,
    /// Production counter captured when the loss was detected.
    pub counter_at_loss: Option<i64>,
    /// Last time a production-without-power event was raised for the ongoing loss.
    pub last_suspicious_alert_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PowerEventKind {
    PowerLoss,
    PowerRestore,
    ProductionWithoutPower,
    PowerFluctuation,
}

impl PowerEventKind {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PowerEventKind::PowerLoss => "power_loss",
            PowerEventKind::PowerRestore => "power_restore",
            PowerEventKind::ProductionWithoutPower => "production_without_power",
            PowerEventKind::PowerFluctuation => "power_fluctuation",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "power_loss" => Some(PowerEventKind::PowerLoss),
            "power_restore" => Some(PowerEventKind::PowerRestore),
            "production_without_power" => Some(PowerEventKind::ProductionWithoutPower),
            "power_fluctuation" => Some(PowerEventKind::PowerFluctuation),
            _ => None,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PowerEventKind::PowerLoss => Severity::High,
            PowerEventKind::PowerRestore => Severity::Medium,
            PowerEventKind::ProductionWithoutPower => Severity::Critical,
            PowerEventKind::PowerFluctuation => Severity::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// Append-only incident entry. Only `resolved` changes after insertion.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PowerEvent {
    pub id: i64,
    pub device_id: i64,
    pub kind: PowerEventKind,
    pub severity: Severity,
    pub occurred_at: NaiveDateTime,
    pub value: Option<f64>,
    pub counter_delta: Option<i64>,
    pub message: String,
    pub resolved: bool,
    pub resolved_at: Option<NaiveDateTime>,
}

/// Outcome of feeding one sample to the power monitor.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    None,
    Loss,
    Restore,
}
