//! Device provisioning and reset bookkeeping.

use crate::db::devices;
use crate::db::log::audit;
use crate::db::pool::DbPool;
use crate::db::resets::insert_reset;
use crate::errors::{AppError, AppResult};
use crate::models::device::{CalculationMode, Device};
use crate::models::reset::ResetLog;
use chrono::NaiveDateTime;

/// Fields a `device set` may change. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct DeviceChanges {
    pub selected_counter: Option<u8>,
    pub calculation_mode: Option<CalculationMode>,
    pub power_threshold: Option<f64>,
}

fn check_counter(slot: u8) -> AppResult<()> {
    if (1..=4).contains(&slot) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "selected counter must be between 1 and 4, got {slot}"
        )))
    }
}

pub struct DeviceLogic;

impl DeviceLogic {
    pub fn add(
        pool: &mut DbPool,
        name: &str,
        factory_id: i64,
        selected_counter: u8,
        mode: CalculationMode,
        power_threshold: f64,
    ) -> AppResult<Device> {
        if name.trim().is_empty() {
            return Err(AppError::Config("device name must not be empty".into()));
        }
        check_counter(selected_counter)?;
        pool.with_tx(false, |tx| {
            let id = devices::insert_device(tx, name, factory_id, selected_counter, mode, power_threshold)?;
            audit(
                tx,
                "device_add",
                name,
                &format!(
                    "factory {factory_id}, counter {selected_counter}, {}, threshold {power_threshold}",
                    mode.to_db_str()
                ),
            )?;
            devices::get_device(tx, id)?.ok_or_else(|| AppError::UnknownDevice(id.to_string()))
        })
    }

    pub fn set(pool: &mut DbPool, device: &Device, changes: &DeviceChanges) -> AppResult<Device> {
        let mut updated = device.clone();
        if let Some(c) = changes.selected_counter {
            check_counter(c)?;
            updated.selected_counter = c;
        }
        if let Some(m) = changes.calculation_mode {
            updated.calculation_mode = m;
        }
        if let Some(t) = changes.power_threshold {
            updated.power_threshold = t;
        }

        pool.with_device_tx(device.id, false, |tx| {
            devices::update_device(tx, &updated)?;
            audit(
                tx,
                "device_set",
                &updated.name,
                &format!(
                    "counter {}, {}, threshold {}",
                    updated.selected_counter,
                    updated.calculation_mode.to_db_str(),
                    updated.power_threshold
                ),
            )
        })?;
        tracing::info!(device_id = device.id, "device updated");
        Ok(updated)
    }

    /// Append the observed outcome of a reset command.
    pub fn record_reset(
        pool: &mut DbPool,
        device: &Device,
        reset_at: NaiveDateTime,
        counter_before: i64,
        reason: &str,
        success: bool,
    ) -> AppResult<i64> {
        let log = ResetLog {
            id: 0,
            device_id: device.id,
            reset_at,
            counter_before,
            reason: reason.to_string(),
            success,
        };
        pool.with_device_tx(device.id, false, |tx| {
            let id = insert_reset(tx, &log)?;
            audit(
                tx,
                "reset",
                &device.name,
                &format!(
                    "{} at {reset_at}, counter before {counter_before}",
                    if success { "succeeded" } else { "failed" }
                ),
            )?;
            Ok(id)
        })
    }
}
