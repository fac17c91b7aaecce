//! Per-device power state machine and production-without-power detector.

use crate::config::Config;
use crate::core::sweep::{DeviceOutcome, SweepReport, sweep_devices};
use crate::db::pool::DbPool;
use crate::db::{devices, power, samples};
use crate::errors::{AppError, AppResult};
use crate::models::device::Device;
use crate::models::power::{PowerEvent, PowerEventKind, PowerStatus, Transition};
use crate::models::sample::RawSample;
use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PowerOutcome {
    pub transition: Transition,
    pub events: Vec<PowerEvent>,
}

impl PowerOutcome {
    fn quiet() -> Self {
        Self {
            transition: Transition::None,
            events: Vec::new(),
        }
    }
}

fn new_event(
    device_id: i64,
    kind: PowerEventKind,
    at: NaiveDateTime,
    value: Option<f64>,
    counter_delta: Option<i64>,
    message: String,
) -> PowerEvent {
    PowerEvent {
        id: 0,
        device_id,
        kind,
        severity: kind.severity(),
        occurred_at: at,
        value,
        counter_delta,
        message,
        resolved: false,
        resolved_at: None,
    }
}

fn emit(conn: &Connection, mut ev: PowerEvent, out: &mut Vec<PowerEvent>) -> AppResult<()> {
    ev.id = power::insert_event(conn, &ev)?;
    tracing::info!(
        device_id = ev.device_id,
        kind = ev.kind.to_db_str(),
        severity = ev.severity.to_db_str(),
        at = %ev.occurred_at,
        "power event"
    );
    out.push(ev);
    Ok(())
}

/// Counter value to measure production-without-power against.
fn loss_baseline(conn: &Connection, device: &Device, status: &PowerStatus) -> AppResult<Option<i64>> {
    if let Some(v) = status.counter_at_loss {
        return Ok(Some(v));
    }
    let Some(since) = status.power_loss_detected_at else {
        return Ok(None);
    };
    Ok(samples::first_sample_at_or_after(conn, device.id, since)?.map(|s| device.counter_of(&s)))
}

/// Feed one sample to the state machine.
///
/// A missing power reading carries no information and changes nothing, and so
/// does a sample older than the last one checked.
pub fn process_sample(
    conn: &Connection,
    device: &Device,
    sample: &RawSample,
    cfg: &Config,
) -> AppResult<PowerOutcome> {
    let Some(value) = sample.power_indicator() else {
        tracing::debug!(device_id = device.id, at = %sample.timestamp, "no power reading, skipped");
        return Ok(PowerOutcome::quiet());
    };
    if !value.is_finite() {
        return Err(AppError::InvalidSample(format!(
            "non-finite power indicator for device {} at {}",
            device.id, sample.timestamp
        )));
    }

    let ts = sample.timestamp;
    let has_power = device.has_power(value);
    let counter = device.counter_of(sample);

    let Some(mut status) = power::get_status(conn, device.id)? else {
        // First observation: establish the state, no transition.
        let status = PowerStatus {
            device_id: device.id,
            has_power,
            last_value: Some(value),
            last_checked_at: ts,
            power_loss_detected_at: (!has_power).then_some(ts),
            power_restored_at: None,
            threshold: device.power_threshold,
            counter_at_loss: (!has_power).then_some(counter),
            last_suspicious_alert_at: None,
        };
        power::save_status(conn, &status)?;
        return Ok(PowerOutcome::quiet());
    };

    if ts < status.last_checked_at {
        tracing::debug!(device_id = device.id, at = %ts, "stale sample ignored for power state");
        return Ok(PowerOutcome::quiet());
    }

    let mut events = Vec::new();
    let transition = match (status.has_power, has_power) {
        (true, false) => {
            status.has_power = false;
            status.power_loss_detected_at = Some(ts);
            status.power_restored_at = None;
            status.counter_at_loss = Some(counter);
            status.last_suspicious_alert_at = None;
            emit(
                conn,
                new_event(
                    device.id,
                    PowerEventKind::PowerLoss,
                    ts,
                    Some(value),
                    None,
                    format!("Power lost on {} (indicator {value})", device.name),
                ),
                &mut events,
            )?;
            Transition::Loss
        }
        (false, true) => {
            status.has_power = true;
            status.power_restored_at = Some(ts);
            status.power_loss_detected_at = None;
            status.counter_at_loss = None;
            status.last_suspicious_alert_at = None;
            power::resolve_open(
                conn,
                device.id,
                &[PowerEventKind::PowerLoss, PowerEventKind::ProductionWithoutPower],
                ts,
            )?;
            emit(
                conn,
                new_event(
                    device.id,
                    PowerEventKind::PowerRestore,
                    ts,
                    Some(value),
                    None,
                    format!("Power restored on {} (indicator {value})", device.name),
                ),
                &mut events,
            )?;
            Transition::Restore
        }
        _ => Transition::None,
    };

    status.last_value = Some(value);
    status.last_checked_at = ts;
    status.threshold = device.power_threshold;

    if transition != Transition::None {
        check_fluctuation(conn, device, ts, cfg, &mut events)?;
    } else if !status.has_power {
        check_production_without_power(conn, device, &mut status, counter, ts, cfg, &mut events)?;
    }

    power::save_status(conn, &status)?;
    Ok(PowerOutcome { transition, events })
}

fn check_production_without_power(
    conn: &Connection,
    device: &Device,
    status: &mut PowerStatus,
    counter: i64,
    ts: NaiveDateTime,
    cfg: &Config,
    events: &mut Vec<PowerEvent>,
) -> AppResult<()> {
    let Some(baseline) = loss_baseline(conn, device, status)? else {
        return Ok(());
    };
    let delta = counter - baseline;
    if delta <= cfg.suspicious_noise_floor {
        return Ok(());
    }

    let interval = Duration::minutes(cfg.suspicious_check_interval_minutes);
    if let Some(last) = status.last_suspicious_alert_at
        && ts - last < interval
    {
        return Ok(());
    }

    status.last_suspicious_alert_at = Some(ts);
    emit(
        conn,
        new_event(
            device.id,
            PowerEventKind::ProductionWithoutPower,
            ts,
            status.last_value,
            Some(delta),
            format!(
                "{} counted {delta} units without power since {}",
                device.name,
                status
                    .power_loss_detected_at
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            ),
        ),
        events,
    )
}

fn check_fluctuation(
    conn: &Connection,
    device: &Device,
    ts: NaiveDateTime,
    cfg: &Config,
    events: &mut Vec<PowerEvent>,
) -> AppResult<()> {
    let since = ts - Duration::minutes(cfg.fluctuation_window_minutes);
    let transitions = power::count_transitions_since(conn, device.id, since)?;
    if transitions < cfg.fluctuation_threshold
        || power::has_event_since(conn, device.id, PowerEventKind::PowerFluctuation, since)?
    {
        return Ok(());
    }

    emit(
        conn,
        new_event(
            device.id,
            PowerEventKind::PowerFluctuation,
            ts,
            None,
            None,
            format!(
                "{} changed power state {transitions} times in {} minutes",
                device.name, cfg.fluctuation_window_minutes
            ),
        ),
        events,
    )
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PowerSweep {
    pub report: SweepReport,
    pub samples: usize,
    pub transitions: usize,
    pub events: usize,
}

pub struct PowerMonitor;

impl PowerMonitor {
    /// Process one sample under the device lock.
    pub fn process(
        pool: &mut DbPool,
        device: &Device,
        sample: &RawSample,
        cfg: &Config,
    ) -> AppResult<PowerOutcome> {
        pool.with_device_tx(device.id, false, |tx| process_sample(tx, device, sample, cfg))
    }

    /// Feed every device the samples it has not seen yet, oldest first.
    pub fn sweep(pool: &mut DbPool, cfg: &Config) -> AppResult<PowerSweep> {
        let fleet = devices::list_devices(&pool.conn)?;
        let mut totals = PowerSweep::default();

        let report = sweep_devices("power", &fleet, |device| {
            let (seen, transitions, events) = pool.with_device_tx(device.id, false, |tx| {
                let after = power::get_status(tx, device.id)?.map(|s| s.last_checked_at);
                let pending = samples::samples_after(tx, device.id, after)?;
                let mut transitions = 0;
                let mut events = 0;
                for s in &pending {
                    let out = process_sample(tx, device, s, cfg)?;
                    if out.transition != Transition::None {
                        transitions += 1;
                    }
                    events += out.events.len();
                }
                Ok((pending.len(), transitions, events))
            })?;

            totals.samples += seen;
            totals.transitions += transitions;
            totals.events += events;
            Ok(match seen {
                0 => DeviceOutcome::NoData,
                _ if transitions + events > 0 => DeviceOutcome::Updated,
                _ => DeviceOutcome::Unchanged,
            })
        });

        totals.report = report;
        Ok(totals)
    }

    /// Resolve a single event by id.
    pub fn resolve(pool: &mut DbPool, event_id: i64, at: NaiveDateTime) -> AppResult<bool> {
        pool.with_tx(false, |tx| power::resolve_event(tx, event_id, at))
    }
}
