//! Batch progress: counter deltas of the factory's devices since the batch
//! started, converted to tons and compared with the expected output.

use crate::config::Config;
use crate::db::log::audit;
use crate::db::pool::DbPool;
use crate::db::{batches, devices, production, samples};
use crate::errors::{AppError, AppResult};
use crate::models::batch::{Batch, BatchStatus, DataSource};
use crate::models::device::Device;
use crate::utils::date::now;
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DeviceProgress {
    pub device_id: i64,
    pub name: String,
    pub start_value: i64,
    pub current_value: i64,
    pub delta: i64,
    pub source: DataSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchProgress {
    pub batch_id: i64,
    /// Units produced since the batch started, summed over devices.
    pub current_delta: i64,
    /// Tons, after the waste factor.
    pub actual_output: f64,
    pub progress_percent: f64,
    pub data_source: DataSource,
    pub devices: Vec<DeviceProgress>,
    pub status: BatchStatus,
    /// True only on the recomputation that moved the batch to `completed`.
    pub completed_now: bool,
}

pub fn units_to_tons(units: i64, kg_per_unit: f64) -> f64 {
    units as f64 * kg_per_unit / 1000.0
}

/// Share of the expected output reached, capped at 100.
pub fn progress_percent(actual: f64, expected: f64) -> f64 {
    if expected <= 0.0 {
        return 0.0;
    }
    (actual / expected * 100.0).clamp(0.0, 100.0)
}

/// Counter delta of one device since the batch start.
///
/// Raw samples are preferred. Without any, the device's daily records since
/// the start date are summed instead (coarser) and the source says so.
pub fn device_progress(conn: &Connection, device: &Device, batch: &Batch) -> AppResult<DeviceProgress> {
    if let Some(latest) = samples::latest_sample(conn, device.id)? {
        let current = device.counter_of(&latest);
        let start = samples::first_sample_at_or_after(conn, device.id, batch.start_date)?
            .map(|s| device.counter_of(&s))
            .unwrap_or(batch.start_value);
        return Ok(DeviceProgress {
            device_id: device.id,
            name: device.name.clone(),
            start_value: start,
            current_value: current,
            delta: (current - start).max(0),
            source: DataSource::RawSamples,
        });
    }

    let (delta, source) = match production::sum_daily_since(conn, device.id, batch.start_date.date())? {
        Some(sum) => (sum.max(0), DataSource::ProductionRecords),
        None => (0, DataSource::None),
    };
    if source == DataSource::ProductionRecords {
        tracing::debug!(device_id = device.id, batch_id = batch.id, "no raw samples, using daily records");
    }
    Ok(DeviceProgress {
        device_id: device.id,
        name: device.name.clone(),
        start_value: 0,
        current_value: delta,
        delta,
        source,
    })
}

/// Compute progress without writing anything.
pub fn calculate_progress(conn: &Connection, batch: &Batch, cfg: &Config) -> AppResult<BatchProgress> {
    let fleet = devices::list_devices_by_factory(conn, batch.factory_id)?;

    let mut per_device = Vec::with_capacity(fleet.len());
    let mut data_source = DataSource::None;
    for device in &fleet {
        let p = device_progress(conn, device, batch)?;
        data_source = data_source.combine(p.source);
        per_device.push(p);
    }

    let current_delta: i64 = per_device.iter().map(|p| p.delta).sum();
    let actual_output = units_to_tons(current_delta, cfg.kg_per_unit) * (1.0 - batch.waste_factor);
    let progress = progress_percent(actual_output, batch.expected_output);

    Ok(BatchProgress {
        batch_id: batch.id,
        current_delta,
        actual_output,
        progress_percent: progress,
        data_source,
        devices: per_device,
        status: batch.status,
        completed_now: false,
    })
}

/// Recompute and persist progress for one batch, completing it on first reaching 100%.
pub fn apply_progress(conn: &Connection, batch_id: i64, cfg: &Config) -> AppResult<BatchProgress> {
    let batch = batches::get_batch(conn, batch_id)?.ok_or(AppError::BatchNotFound(batch_id))?;
    let mut progress = calculate_progress(conn, &batch, cfg)?;

    let complete = progress.progress_percent >= 100.0 && !batch.status.blocks_completion();
    let completed_at = complete.then(now);

    batches::apply_progress(
        conn,
        batch.id,
        progress.current_delta,
        progress.actual_output,
        progress.data_source,
        completed_at,
    )?;

    if complete {
        progress.status = BatchStatus::Completed;
        progress.completed_now = true;
        tracing::info!(batch_id, actual_output = progress.actual_output, "batch completed");
        audit(
            conn,
            "batch_completed",
            &batch.name,
            &format!(
                "{:.3} t of {:.3} t expected",
                progress.actual_output, batch.expected_output
            ),
        )?;
    }
    Ok(progress)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSweep {
    pub processed: usize,
    pub completed: usize,
    pub errors: usize,
    pub results: Vec<BatchProgress>,
}

pub struct BatchLogic;

impl BatchLogic {
    /// Register a new batch in `pending` status.
    pub fn create(
        pool: &mut DbPool,
        name: &str,
        factory_id: i64,
        start_date: NaiveDateTime,
        start_value: i64,
        expected_output: f64,
        waste_factor: f64,
    ) -> AppResult<i64> {
        if !(0.0..1.0).contains(&waste_factor) {
            return Err(AppError::Config(format!(
                "waste factor must be in [0, 1), got {waste_factor}"
            )));
        }
        let batch = Batch {
            id: 0,
            name: name.to_string(),
            factory_id,
            start_date,
            start_value,
            current_value: 0,
            expected_output,
            actual_output: 0.0,
            waste_factor,
            status: BatchStatus::Pending,
            is_completed: false,
            completed_at: None,
        };
        pool.with_tx(false, |tx| {
            let id = batches::insert_batch(tx, &batch)?;
            audit(
                tx,
                "batch_add",
                name,
                &format!("factory {factory_id}, {expected_output:.3} t expected"),
            )?;
            Ok(id)
        })
    }

    /// Explicit lifecycle change by an operator, e.g. reopening a completed batch.
    pub fn set_status(pool: &mut DbPool, batch_id: i64, status: BatchStatus) -> AppResult<()> {
        pool.with_tx(false, |tx| {
            let batch = batches::get_batch(tx, batch_id)?.ok_or(AppError::BatchNotFound(batch_id))?;
            batches::set_status(tx, batch_id, status)?;
            audit(
                tx,
                "batch_status",
                &batch.name,
                &format!("{} -> {}", batch.status.to_db_str(), status.to_db_str()),
            )
        })
    }

    /// One recomputation, applied as a single atomic write.
    pub fn recompute(pool: &mut DbPool, batch_id: i64, cfg: &Config) -> AppResult<BatchProgress> {
        pool.with_tx(false, |tx| apply_progress(tx, batch_id, cfg))
    }

    /// Recompute every batch that is not completed, stopped or rejected.
    pub fn sweep(pool: &mut DbPool, cfg: &Config) -> AppResult<BatchSweep> {
        let open = batches::list_open_batches(&pool.conn)?;
        let mut out = BatchSweep::default();
        for batch in open {
            out.processed += 1;
            match Self::recompute(pool, batch.id, cfg) {
                Ok(p) => {
                    if p.completed_now {
                        out.completed += 1;
                    }
                    out.results.push(p);
                }
                Err(e) => {
                    tracing::error!(batch_id = batch.id, error = %e, "batch recomputation failed");
                    out.errors += 1;
                }
            }
        }
        Ok(out)
    }
}
