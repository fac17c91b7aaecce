//! Historical correction: find stored days that absorbed several days of
//! production after a telemetry gap and spread them back over the gap.

use crate::config::Config;
use crate::core::calculator::backfill::is_anomalous;
use crate::core::production::{apply_redistribution, rechain_after};
use crate::db::log::audit;
use crate::db::pool::DbPool;
use crate::db::{devices, production};
use crate::errors::AppResult;
use crate::models::device::Device;
use crate::models::production::RecordSource;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CorrectionItem {
    pub device_id: i64,
    pub date: NaiveDate,
    pub original: i64,
    pub trailing_average: Option<f64>,
    /// Days from the previous record to this one.
    pub gap_days: i64,
    /// Share written to each gap day (the last day also takes the remainder).
    pub per_day: i64,
    /// False when the entry was flagged but had no gap to spread over.
    pub corrected: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrectionReport {
    pub analyzed: usize,
    pub flagged: usize,
    pub corrected: usize,
    pub dry_run: bool,
    pub errors: usize,
    pub items: Vec<CorrectionItem>,
}

/// Scan one device's records and repair the anomalous ones in place.
///
/// Only records computed from samples are candidates; days already produced
/// by a redistribution are never re-flagged.
pub fn correct_device(
    conn: &Connection,
    device: &Device,
    multiplier: f64,
    cfg: &Config,
) -> AppResult<(usize, Vec<CorrectionItem>)> {
    let dates: Vec<NaiveDate> = production::all_records(conn, device.id)?
        .into_iter()
        .filter(|r| r.source == RecordSource::Sample)
        .map(|r| r.date)
        .collect();

    let mut items = Vec::new();
    for date in &dates {
        // Earlier corrections may have rewritten this row's neighbours.
        let Some(rec) = production::get_record(conn, device.id, *date)? else {
            continue;
        };
        let avg = production::trailing_average(conn, device.id, rec.date, cfg.trailing_window_days)?;
        if !is_anomalous(rec.daily, avg, multiplier, cfg.anomaly_floor) {
            continue;
        }

        let previous = production::previous_record(conn, device.id, rec.date)?;
        let gap_days = previous.as_ref().map_or(0, |p| (rec.date - p.date).num_days());

        let Some(start) = previous.filter(|_| gap_days > 1) else {
            tracing::info!(device_id = device.id, date = %rec.date, daily = rec.daily, "anomalous day without gap, left as is");
            items.push(CorrectionItem {
                device_id: device.id,
                date: rec.date,
                original: rec.daily,
                trailing_average: avg,
                gap_days,
                per_day: rec.daily,
                corrected: false,
            });
            continue;
        };

        apply_redistribution(conn, &start, rec.date, rec.daily, rec.counter_value)?;
        rechain_after(conn, device.id, rec.date)?;

        let per_day = rec.daily / gap_days;
        audit(
            conn,
            "correct",
            &format!("{}:{}", device.name, rec.date),
            &format!(
                "{} units spread over {} days ({} per day) after {}",
                rec.daily, gap_days, per_day, start.date
            ),
        )?;
        items.push(CorrectionItem {
            device_id: device.id,
            date: rec.date,
            original: rec.daily,
            trailing_average: avg,
            gap_days,
            per_day,
            corrected: true,
        });
    }
    Ok((dates.len(), items))
}

pub struct CorrectionLogic;

impl CorrectionLogic {
    /// Run the correction over one device or the whole fleet.
    ///
    /// Each device is handled in its own transaction under its lock. In
    /// `dry_run` the transaction is rolled back, so the report matches what a
    /// real run would do while nothing is persisted.
    pub fn scan_and_correct(
        pool: &mut DbPool,
        multiplier: f64,
        only: Option<&Device>,
        dry_run: bool,
        cfg: &Config,
    ) -> AppResult<CorrectionReport> {
        let fleet = match only {
            Some(d) => vec![d.clone()],
            None => devices::list_devices(&pool.conn)?,
        };

        let mut report = CorrectionReport {
            dry_run,
            ..Default::default()
        };
        for device in &fleet {
            let result = pool.with_device_tx(device.id, dry_run, |tx| {
                correct_device(tx, device, multiplier, cfg)
            });
            match result {
                Ok((analyzed, items)) => {
                    report.analyzed += analyzed;
                    report.flagged += items.len();
                    report.corrected += items.iter().filter(|i| i.corrected).count();
                    report.items.extend(items);
                }
                Err(e) => {
                    tracing::error!(device_id = device.id, error = %e, "correction failed");
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            analyzed = report.analyzed,
            flagged = report.flagged,
            corrected = report.corrected,
            dry_run,
            "correction scan finished"
        );
        Ok(report)
    }
}
