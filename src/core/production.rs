//! Daily production records: compute, persist, backfill gaps and keep the
//! cumulative totals chained.

use crate::config::Config;
use crate::core::calculator::backfill::{is_anomalous, redistribute};
use crate::core::calculator::periods::next_totals;
use crate::core::calculator::{DailyInputs, DailyQuantity, compute_daily};
use crate::core::sweep::{DeviceOutcome, SweepReport, sweep_devices};
use crate::db::pool::DbPool;
use crate::db::{devices, production, resets, samples};
use crate::errors::AppResult;
use crate::models::device::Device;
use crate::models::production::{DailyMethod, ProductionRecord, RecordSource};
use crate::utils::date::days_between;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecomputeOutcome {
    /// No sample on that date: nothing written, nothing fabricated.
    NoData,
    Written { record: ProductionRecord },
    /// The day closed an anomalous gap; one record per gap day was written.
    Backfilled { records: Vec<ProductionRecord> },
}

impl RecomputeOutcome {
    pub fn is_written(&self) -> bool {
        !matches!(self, RecomputeOutcome::NoData)
    }
}

/// Gather the readings a formula needs for `date`. `None` means no sample that day.
pub fn load_inputs(
    conn: &Connection,
    device: &Device,
    date: NaiveDate,
    cfg: &Config,
) -> AppResult<Option<DailyInputs>> {
    let Some(current) = samples::reading_on(conn, device, date)? else {
        return Ok(None);
    };
    let prior = samples::reading_before(conn, device, date, cfg.lookback_days)?;
    let reset = resets::successful_reset_on(conn, device.id, date)?;
    Ok(Some(DailyInputs {
        current,
        prior,
        reset,
    }))
}

/// Daily quantity for one device and date, without persisting anything.
pub fn compute_day(
    conn: &Connection,
    device: &Device,
    date: NaiveDate,
    cfg: &Config,
) -> AppResult<Option<DailyQuantity>> {
    Ok(load_inputs(conn, device, date, cfg)?.map(|inputs| compute_daily(device.calculation_mode, &inputs)))
}

/// Spread `total` over the days after `start.date` up to `date` and write one
/// record per day, chaining totals from `start`.
///
/// Stale backfill rows inside the gap are replaced. The last day keeps the
/// real counter reading and is tagged `redistributed`; the others are
/// `backfill`. Later records are not touched, see [`rechain_after`].
pub fn apply_redistribution(
    conn: &Connection,
    start: &ProductionRecord,
    date: NaiveDate,
    total: i64,
    counter_value: i64,
) -> AppResult<Vec<ProductionRecord>> {
    production::delete_backfill_between(conn, start.device_id, start.date, date)?;

    let mut previous = (start.date, start.totals);
    let mut written = Vec::new();
    for (day, share) in redistribute(total, start.date, date) {
        let anchor_day = day == date;
        let totals = next_totals(Some(previous), day, share);
        let rec = ProductionRecord {
            id: 0,
            device_id: start.device_id,
            date: day,
            daily: share,
            totals,
            counter_value: if anchor_day { counter_value } else { 0 },
            source: if anchor_day {
                RecordSource::Redistributed
            } else {
                RecordSource::Backfill
            },
            method: DailyMethod::Backfill,
            updated_at: String::new(),
        };
        production::upsert_record(conn, &rec)?;
        previous = (day, totals);
        written.push(rec);
    }

    tracing::info!(
        device_id = start.device_id,
        from = %start.date,
        to = %date,
        total,
        days = written.len(),
        "gap redistributed"
    );
    Ok(written)
}

/// Recompute weekly/monthly/yearly of every record after `date`, seeded from
/// the record at (or else before) `date`. Returns how many rows changed.
pub fn rechain_after(conn: &Connection, device_id: i64, date: NaiveDate) -> AppResult<usize> {
    let seed = match production::get_record(conn, device_id, date)? {
        Some(r) => Some(r),
        None => production::previous_record(conn, device_id, date)?,
    };
    let mut previous = seed.map(|r| (r.date, r.totals));

    let mut changed = 0;
    for rec in production::records_after(conn, device_id, date)? {
        let totals = next_totals(previous, rec.date, rec.daily);
        if totals != rec.totals {
            production::update_totals(conn, rec.id, &totals)?;
            changed += 1;
        }
        previous = Some((rec.date, totals));
    }
    Ok(changed)
}

/// Re-derive the daily value of the first record after `date` when it came
/// from a sample, since its prior reading may now be the one on `date`.
/// Totals are left to [`rechain_after`]. Returns whether the row changed.
fn refresh_next_daily(conn: &Connection, device: &Device, date: NaiveDate, cfg: &Config) -> AppResult<bool> {
    let Some(next) = production::records_after(conn, device.id, date)?.into_iter().next() else {
        return Ok(false);
    };
    if next.source != RecordSource::Sample {
        return Ok(false);
    }
    let Some(q) = compute_day(conn, device, next.date, cfg)? else {
        return Ok(false);
    };
    if q.quantity == next.daily && q.method == next.method {
        return Ok(false);
    }

    tracing::debug!(
        device_id = device.id,
        date = %next.date,
        old = next.daily,
        new = q.quantity,
        "daily value re-derived after late sample"
    );
    production::upsert_record(
        conn,
        &ProductionRecord {
            daily: q.quantity,
            method: q.method,
            counter_value: q.counter_value,
            ..next
        },
    )?;
    Ok(true)
}

/// Compute and persist the record for `date`. Idempotent: running it again on
/// unchanged inputs overwrites the same values.
pub fn recompute_day(
    conn: &Connection,
    device: &Device,
    date: NaiveDate,
    cfg: &Config,
) -> AppResult<RecomputeOutcome> {
    let Some(q) = compute_day(conn, device, date, cfg)? else {
        tracing::debug!(device_id = device.id, %date, "no sample for date");
        return Ok(RecomputeOutcome::NoData);
    };

    if let Some(anchor) = production::previous_anchor(conn, device.id, date)? {
        let gap = (date - anchor.date).num_days();
        if gap > 1 {
            let already_spread =
                production::count_backfill_between(conn, device.id, anchor.date, date)? > 0;
            let avg = production::trailing_average(conn, device.id, date, cfg.trailing_window_days)?;
            if already_spread || is_anomalous(q.quantity, avg, cfg.anomaly_ratio, cfg.anomaly_floor) {
                tracing::warn!(
                    device_id = device.id,
                    %date,
                    jump = q.quantity,
                    gap,
                    trailing_average = ?avg,
                    "anomalous jump after gap, backfilling"
                );
                let records = apply_redistribution(conn, &anchor, date, q.quantity, q.counter_value)?;
                refresh_next_daily(conn, device, date, cfg)?;
                rechain_after(conn, device.id, date)?;
                return Ok(RecomputeOutcome::Backfilled { records });
            }
        }
    }

    let previous = production::previous_record(conn, device.id, date)?;
    let rec = ProductionRecord {
        id: 0,
        device_id: device.id,
        date,
        daily: q.quantity,
        totals: next_totals(previous.map(|p| (p.date, p.totals)), date, q.quantity),
        counter_value: q.counter_value,
        source: RecordSource::Sample,
        method: q.method,
        updated_at: String::new(),
    };
    production::upsert_record(conn, &rec)?;
    refresh_next_daily(conn, device, date, cfg)?;
    rechain_after(conn, device.id, date)?;

    Ok(RecomputeOutcome::Written { record: rec })
}

pub struct ProductionLogic;

impl ProductionLogic {
    /// Recompute one device/date under the device lock, in one transaction.
    pub fn recompute(
        pool: &mut DbPool,
        device: &Device,
        date: NaiveDate,
        cfg: &Config,
    ) -> AppResult<RecomputeOutcome> {
        pool.with_device_tx(device.id, false, |tx| recompute_day(tx, device, date, cfg))
    }

    /// Recompute `from..=to` in ascending date order for one device.
    pub fn recompute_range(
        pool: &mut DbPool,
        device: &Device,
        from: NaiveDate,
        to: NaiveDate,
        cfg: &Config,
    ) -> AppResult<Vec<(NaiveDate, RecomputeOutcome)>> {
        let dates = days_between(from, to);
        pool.with_device_tx(device.id, false, |tx| {
            let mut out = Vec::with_capacity(dates.len());
            for d in &dates {
                out.push((*d, recompute_day(tx, device, *d, cfg)?));
            }
            Ok(out)
        })
    }

    /// Recompute `from..=to` for every device (or the given ones), isolating failures.
    pub fn sweep(
        pool: &mut DbPool,
        from: NaiveDate,
        to: NaiveDate,
        only: Option<&Device>,
        cfg: &Config,
    ) -> AppResult<SweepReport> {
        let fleet = match only {
            Some(d) => vec![d.clone()],
            None => devices::list_devices(&pool.conn)?,
        };

        Ok(sweep_devices("production", &fleet, |device| {
            let outcomes = Self::recompute_range(pool, device, from, to, cfg)?;
            if outcomes.iter().any(|(_, o)| o.is_written()) {
                Ok(DeviceOutcome::Updated)
            } else {
                Ok(DeviceOutcome::NoData)
            }
        }))
    }
}
