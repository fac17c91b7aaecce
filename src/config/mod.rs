use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Runtime configuration, loaded once at startup and passed down explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// How far back (days) to look for the latest earlier sample.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    /// Window (days) of the trailing average used for anomaly detection.
    #[serde(default = "default_trailing_window_days")]
    pub trailing_window_days: i64,
    /// A jump is anomalous when it exceeds `anomaly_ratio` times the trailing average.
    #[serde(default = "default_anomaly_ratio")]
    pub anomaly_ratio: f64,
    /// Absolute threshold used when no trailing history exists.
    #[serde(default = "default_anomaly_floor")]
    pub anomaly_floor: i64,

    #[serde(default = "default_suspicious_check_interval")]
    pub suspicious_check_interval_minutes: i64,
    /// Counter movement tolerated while unpowered before raising an incident.
    #[serde(default = "default_suspicious_noise_floor")]
    pub suspicious_noise_floor: i64,
    #[serde(default = "default_fluctuation_window")]
    pub fluctuation_window_minutes: i64,
    #[serde(default = "default_fluctuation_threshold")]
    pub fluctuation_threshold: i64,

    #[serde(default = "default_kg_per_unit")]
    pub kg_per_unit: f64,
    #[serde(default)]
    pub default_waste_factor: f64,

    #[serde(default = "default_busy_retries")]
    pub busy_retries: u32,
}

fn default_database() -> String {
    Config::database_file().to_string_lossy().to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_lookback_days() -> i64 {
    30
}
fn default_trailing_window_days() -> i64 {
    30
}
fn default_anomaly_ratio() -> f64 {
    5.0
}
fn default_anomaly_floor() -> i64 {
    500
}
fn default_suspicious_check_interval() -> i64 {
    5
}
fn default_suspicious_noise_floor() -> i64 {
    2
}
fn default_fluctuation_window() -> i64 {
    10
}
fn default_fluctuation_threshold() -> i64 {
    3
}
fn default_kg_per_unit() -> f64 {
    50.0
}
fn default_busy_retries() -> u32 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            log_level: default_log_level(),
            lookback_days: default_lookback_days(),
            trailing_window_days: default_trailing_window_days(),
            anomaly_ratio: default_anomaly_ratio(),
            anomaly_floor: default_anomaly_floor(),
            suspicious_check_interval_minutes: default_suspicious_check_interval(),
            suspicious_noise_floor: default_suspicious_noise_floor(),
            fluctuation_window_minutes: default_fluctuation_window(),
            fluctuation_threshold: default_fluctuation_threshold(),
            kg_per_unit: default_kg_per_unit(),
            default_waste_factor: 0.0,
            busy_retries: default_busy_retries(),
        }
    }
}

impl Config {
    /// Return the standard configuration directory depending on the platform
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(appdata).join("milltrack")
        } else {
            let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".milltrack")
        }
    }

    /// Return the full path of the config file
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("milltrack.conf")
    }

    /// Return the full path of the SQLite database
    pub fn database_file() -> PathBuf {
        Self::config_dir().join("milltrack.sqlite")
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> AppResult<Self> {
        let path = Self::config_file();
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&path).map_err(|_| AppError::ConfigLoad)?;
        let cfg: Config = serde_yaml::from_str(&content)?;
        Ok(cfg)
    }

    /// Write the configuration file (skipped in test mode) and create an empty DB file.
    pub fn init_all(&self, is_test: bool) -> AppResult<()> {
        let dir = Self::config_dir();
        if !is_test {
            fs::create_dir_all(&dir)?;
            let yaml = serde_yaml::to_string(self)?;
            let mut file = fs::File::create(Self::config_file()).map_err(|_| AppError::ConfigSave)?;
            file.write_all(yaml.as_bytes())
                .map_err(|_| AppError::ConfigSave)?;
        }

        let db_path = PathBuf::from(&self.database);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        if !db_path.exists() {
            fs::File::create(&db_path)?;
        }
        Ok(())
    }

    /// Range checks on the numeric settings. Returns every problem found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.lookback_days < 1 {
            problems.push("lookback_days must be at least 1".to_string());
        }
        if self.trailing_window_days < 1 {
            problems.push("trailing_window_days must be at least 1".to_string());
        }
        if self.anomaly_ratio <= 1.0 {
            problems.push("anomaly_ratio must be greater than 1.0".to_string());
        }
        if self.anomaly_floor < 0 {
            problems.push("anomaly_floor must not be negative".to_string());
        }
        if self.suspicious_check_interval_minutes < 0 {
            problems.push("suspicious_check_interval_minutes must not be negative".to_string());
        }
        if self.suspicious_noise_floor < 0 {
            problems.push("suspicious_noise_floor must not be negative".to_string());
        }
        if self.fluctuation_threshold < 2 {
            problems.push("fluctuation_threshold must be at least 2".to_string());
        }
        if self.kg_per_unit <= 0.0 {
            problems.push("kg_per_unit must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.default_waste_factor) {
            problems.push("default_waste_factor must be in [0, 1)".to_string());
        }
        problems
    }
}
