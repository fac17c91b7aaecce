use crate::db::{conversion_err, opt_ts_col, ts_col};
use crate::errors::{AppError, AppResult};
use crate::models::batch::{Batch, BatchStatus, DataSource};
use crate::utils::date::{fmt_ts, now};
use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, Row, params};

fn map_batch(row: &Row) -> rusqlite::Result<Batch> {
    let status_str: String = row.get("status")?;
    let status = BatchStatus::from_db_str(&status_str)
        .ok_or_else(|| conversion_err(AppError::InvalidStatus(status_str.clone())))?;

    Ok(Batch {
        id: row.get("id")?,
        name: row.get("name")?,
        factory_id: row.get("factory_id")?,
        start_date: ts_col(row, "start_date")?,
        start_value: row.get("start_value")?,
        current_value: row.get("current_value")?,
        expected_output: row.get("expected_output")?,
        actual_output: row.get("actual_output")?,
        waste_factor: row.get("waste_factor")?,
        status,
        is_completed: row.get::<_, i64>("is_completed")? == 1,
        completed_at: opt_ts_col(row, "completed_at")?,
    })
}

pub fn insert_batch(conn: &Connection, b: &Batch) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO batches
            (name, factory_id, start_date, start_value, current_value, expected_output,
             actual_output, waste_factor, status, is_completed, completed_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            b.name,
            b.factory_id,
            fmt_ts(&b.start_date),
            b.start_value,
            b.current_value,
            b.expected_output,
            b.actual_output,
            b.waste_factor,
            b.status.to_db_str(),
            b.is_completed as i64,
            b.completed_at.map(|t| fmt_ts(&t)),
            fmt_ts(&now()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_batch(conn: &Connection, id: i64) -> AppResult<Option<Batch>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM batches WHERE id = ?1")?;
    Ok(stmt.query_row([id], map_batch).optional()?)
}

pub fn list_batches(conn: &Connection) -> AppResult<Vec<Batch>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM batches ORDER BY id ASC")?;
    let rows = stmt.query_map([], map_batch)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Batches whose progress still moves: everything not completed, stopped or rejected.
pub fn list_open_batches(conn: &Connection) -> AppResult<Vec<Batch>> {
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM batches WHERE status NOT IN ('completed','stopped','rejected') ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([], map_batch)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn set_status(conn: &Connection, id: i64, status: BatchStatus) -> AppResult<bool> {
    let n = conn.execute(
        "UPDATE batches SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.to_db_str(), fmt_ts(&now()), id],
    )?;
    Ok(n == 1)
}

/// Apply a progress recomputation in a single statement.
///
/// When `completed_at` is set the batch also moves to `completed`; the caller
/// decides whether that transition is allowed.
pub fn apply_progress(
    conn: &Connection,
    id: i64,
    current_value: i64,
    actual_output: f64,
    source: DataSource,
    completed_at: Option<NaiveDateTime>,
) -> AppResult<()> {
    conn.execute(
        "UPDATE batches SET
            current_value = ?1,
            actual_output = ?2,
            data_source   = ?3,
            updated_at    = ?4,
            status        = CASE WHEN ?5 IS NOT NULL THEN 'completed' ELSE status END,
            is_completed  = CASE WHEN ?5 IS NOT NULL THEN 1 ELSE is_completed END,
            completed_at  = COALESCE(?5, completed_at)
         WHERE id = ?6",
        params![
            current_value,
            actual_output,
            source.to_db_str(),
            fmt_ts(&now()),
            completed_at.map(|t| fmt_ts(&t)),
            id,
        ],
    )?;
    Ok(())
}
