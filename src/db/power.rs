use crate::db::{conversion_err, opt_ts_col, ts_col};
use crate::errors::{AppError, AppResult};
use crate::models::power::{PowerEvent, PowerEventKind, PowerStatus, Severity};
use crate::utils::date::fmt_ts;
use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, Row, params};

fn map_status(row: &Row) -> rusqlite::Result<PowerStatus> {
    Ok(PowerStatus {
        device_id: row.get("device_id")?,
        has_power: row.get::<_, i64>("has_power")? == 1,
        last_value: row.get("last_value")?,
        last_checked_at: ts_col(row, "last_checked_at")?,
        power_loss_detected_at: opt_ts_col(row, "power_loss_detected_at")?,
        power_restored_at: opt_ts_col(row, "power_restored_at")?,
        threshold: row.get("threshold")?,
        counter_at_loss: row.get("counter_at_loss")?,
        last_suspicious_alert_at: opt_ts_col(row, "last_suspicious_alert_at")?,
    })
}

fn map_event(row: &Row) -> rusqlite::Result<PowerEvent> {
    let kind_str: String = row.get("kind")?;
    let kind = PowerEventKind::from_db_str(&kind_str)
        .ok_or_else(|| conversion_err(AppError::Other(format!("Invalid event kind: {kind_str}"))))?;
    let sev_str: String = row.get("severity")?;
    let severity = Severity::from_db_str(&sev_str)
        .ok_or_else(|| conversion_err(AppError::Other(format!("Invalid severity: {sev_str}"))))?;

    Ok(PowerEvent {
        id: row.get("id")?,
        device_id: row.get("device_id")?,
        kind,
        severity,
        occurred_at: ts_col(row, "occurred_at")?,
        value: row.get("value")?,
        counter_delta: row.get("counter_delta")?,
        message: row.get("message")?,
        resolved: row.get::<_, i64>("resolved")? == 1,
        resolved_at: opt_ts_col(row, "resolved_at")?,
    })
}

pub fn get_status(conn: &Connection, device_id: i64) -> AppResult<Option<PowerStatus>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM power_status WHERE device_id = ?1")?;
    Ok(stmt.query_row([device_id], map_status).optional()?)
}

pub fn list_statuses(conn: &Connection) -> AppResult<Vec<PowerStatus>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM power_status ORDER BY device_id ASC")?;
    let rows = stmt.query_map([], map_status)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Write the live row of a device (one row per device).
pub fn save_status(conn: &Connection, s: &PowerStatus) -> AppResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO power_status
            (device_id, has_power, last_value, last_checked_at, power_loss_detected_at,
             power_restored_at, threshold, counter_at_loss, last_suspicious_alert_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(device_id) DO UPDATE SET
            has_power = excluded.has_power,
            last_value = excluded.last_value,
            last_checked_at = excluded.last_checked_at,
            power_loss_detected_at = excluded.power_loss_detected_at,
            power_restored_at = excluded.power_restored_at,
            threshold = excluded.threshold,
            counter_at_loss = excluded.counter_at_loss,
            last_suspicious_alert_at = excluded.last_suspicious_alert_at",
    )?;
    stmt.execute(params![
        s.device_id,
        s.has_power as i64,
        s.last_value,
        fmt_ts(&s.last_checked_at),
        s.power_loss_detected_at.map(|t| fmt_ts(&t)),
        s.power_restored_at.map(|t| fmt_ts(&t)),
        s.threshold,
        s.counter_at_loss,
        s.last_suspicious_alert_at.map(|t| fmt_ts(&t)),
    ])?;
    Ok(())
}

pub fn insert_event(conn: &Connection, ev: &PowerEvent) -> AppResult<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO power_events
            (device_id, kind, severity, occurred_at, value, counter_delta, message, resolved, resolved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    stmt.execute(params![
        ev.device_id,
        ev.kind.to_db_str(),
        ev.severity.to_db_str(),
        fmt_ts(&ev.occurred_at),
        ev.value,
        ev.counter_delta,
        ev.message,
        ev.resolved as i64,
        ev.resolved_at.map(|t| fmt_ts(&t)),
    ])?;
    Ok(conn.last_insert_rowid())
}

/// Events, newest first, optionally restricted to one device and/or unresolved ones.
pub fn list_events(conn: &Connection, device_id: Option<i64>, open_only: bool) -> AppResult<Vec<PowerEvent>> {
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM power_events
         WHERE (?1 IS NULL OR device_id = ?1) AND (?2 = 0 OR resolved = 0)
         ORDER BY occurred_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![device_id, open_only as i64], map_event)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Number of loss/restore events at or after `since`.
pub fn count_transitions_since(conn: &Connection, device_id: i64, since: NaiveDateTime) -> AppResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM power_events
         WHERE device_id = ?1 AND kind IN ('power_loss','power_restore') AND occurred_at >= ?2",
        params![device_id, fmt_ts(&since)],
        |row| row.get(0),
    )?)
}

pub fn has_event_since(
    conn: &Connection,
    device_id: i64,
    kind: PowerEventKind,
    since: NaiveDateTime,
) -> AppResult<bool> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM power_events WHERE device_id = ?1 AND kind = ?2 AND occurred_at >= ?3 LIMIT 1",
    )?;
    Ok(stmt.exists(params![device_id, kind.to_db_str(), fmt_ts(&since)])?)
}

/// Mark every open event of the given kinds resolved. Returns how many were closed.
pub fn resolve_open(
    conn: &Connection,
    device_id: i64,
    kinds: &[PowerEventKind],
    at: NaiveDateTime,
) -> AppResult<usize> {
    let mut total = 0;
    for kind in kinds {
        total += conn.execute(
            "UPDATE power_events SET resolved = 1, resolved_at = ?1
             WHERE device_id = ?2 AND kind = ?3 AND resolved = 0",
            params![fmt_ts(&at), device_id, kind.to_db_str()],
        )?;
    }
    Ok(total)
}

/// Resolve one event by id. Returns `false` if it does not exist or was already resolved.
pub fn resolve_event(conn: &Connection, id: i64, at: NaiveDateTime) -> AppResult<bool> {
    let n = conn.execute(
        "UPDATE power_events SET resolved = 1, resolved_at = ?1 WHERE id = ?2 AND resolved = 0",
        params![fmt_ts(&at), id],
    )?;
    Ok(n == 1)
}
