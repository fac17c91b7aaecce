use crate::db::ts_col;
use crate::errors::AppResult;
use crate::models::reset::ResetLog;
use crate::utils::date::{day_end, day_start, fmt_ts, now};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};

fn map_reset(row: &Row) -> rusqlite::Result<ResetLog> {
    Ok(ResetLog {
        id: row.get("id")?,
        device_id: row.get("device_id")?,
        reset_at: ts_col(row, "reset_at")?,
        counter_before: row.get("counter_before")?,
        reason: row.get("reason")?,
        success: row.get::<_, i64>("success")? == 1,
    })
}

pub fn insert_reset(conn: &Connection, r: &ResetLog) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO reset_logs (device_id, reset_at, counter_before, reason, success, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            r.device_id,
            fmt_ts(&r.reset_at),
            r.counter_before,
            r.reason,
            r.success as i64,
            fmt_ts(&now()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Latest successful reset recorded on `date`, if any.
pub fn successful_reset_on(
    conn: &Connection,
    device_id: i64,
    date: NaiveDate,
) -> AppResult<Option<ResetLog>> {
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM reset_logs
         WHERE device_id = ?1 AND success = 1 AND reset_at >= ?2 AND reset_at < ?3
         ORDER BY reset_at DESC LIMIT 1",
    )?;
    Ok(stmt
        .query_row(
            params![device_id, fmt_ts(&day_start(date)), fmt_ts(&day_end(date))],
            map_reset,
        )
        .optional()?)
}

pub fn list_resets(conn: &Connection, device_id: i64) -> AppResult<Vec<ResetLog>> {
    let mut stmt = conn
        .prepare_cached("SELECT * FROM reset_logs WHERE device_id = ?1 ORDER BY reset_at ASC")?;
    let rows = stmt.query_map([device_id], map_reset)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
