use crate::db::{conversion_err, date_col};
use crate::errors::{AppError, AppResult};
use crate::models::production::{DailyMethod, ProductionRecord, RecordSource, Totals};
use crate::utils::date::{fmt_date, fmt_ts, now};
use chrono::{Duration, NaiveDate};
use rusqlite::{Connection, OptionalExtension, Row, params};

pub fn map_record(row: &Row) -> rusqlite::Result<ProductionRecord> {
    let source_str: String = row.get("source")?;
    let source = RecordSource::from_db_str(&source_str).ok_or_else(|| {
        conversion_err(AppError::Other(format!("Invalid record source: {source_str}")))
    })?;
    let method_str: String = row.get("method")?;
    let method = DailyMethod::from_db_str(&method_str).ok_or_else(|| {
        conversion_err(AppError::Other(format!("Invalid record method: {method_str}")))
    })?;

    Ok(ProductionRecord {
        id: row.get("id")?,
        device_id: row.get("device_id")?,
        date: date_col(row, "date")?,
        daily: row.get("daily")?,
        totals: Totals {
            weekly: row.get("weekly")?,
            monthly: row.get("monthly")?,
            yearly: row.get("yearly")?,
        },
        counter_value: row.get("counter_value")?,
        source,
        method,
        updated_at: row.get("updated_at")?,
    })
}

fn one_record(conn: &Connection, sql: &str, p: impl rusqlite::Params) -> AppResult<Option<ProductionRecord>> {
    let mut stmt = conn.prepare_cached(sql)?;
    Ok(stmt.query_row(p, map_record).optional()?)
}

fn many_records(conn: &Connection, sql: &str, p: impl rusqlite::Params) -> AppResult<Vec<ProductionRecord>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(p, map_record)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn get_record(conn: &Connection, device_id: i64, date: NaiveDate) -> AppResult<Option<ProductionRecord>> {
    one_record(
        conn,
        "SELECT * FROM production_records WHERE device_id = ?1 AND date = ?2",
        params![device_id, fmt_date(&date)],
    )
}

/// The record immediately before `date`, whatever its provenance.
pub fn previous_record(conn: &Connection, device_id: i64, date: NaiveDate) -> AppResult<Option<ProductionRecord>> {
    one_record(
        conn,
        "SELECT * FROM production_records WHERE device_id = ?1 AND date < ?2
         ORDER BY date DESC LIMIT 1",
        params![device_id, fmt_date(&date)],
    )
}

/// The latest record before `date` that is not a synthetic backfill day.
pub fn previous_anchor(conn: &Connection, device_id: i64, date: NaiveDate) -> AppResult<Option<ProductionRecord>> {
    one_record(
        conn,
        "SELECT * FROM production_records WHERE device_id = ?1 AND date < ?2 AND source <> 'backfill'
         ORDER BY date DESC LIMIT 1",
        params![device_id, fmt_date(&date)],
    )
}

/// Records with `from <= date <= to`, oldest first.
pub fn list_records(
    conn: &Connection,
    device_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<ProductionRecord>> {
    many_records(
        conn,
        "SELECT * FROM production_records WHERE device_id = ?1 AND date >= ?2 AND date <= ?3
         ORDER BY date ASC",
        params![device_id, fmt_date(&from), fmt_date(&to)],
    )
}

/// Every record of a device, oldest first.
pub fn all_records(conn: &Connection, device_id: i64) -> AppResult<Vec<ProductionRecord>> {
    many_records(
        conn,
        "SELECT * FROM production_records WHERE device_id = ?1 ORDER BY date ASC",
        [device_id],
    )
}

/// Records strictly after `date`, oldest first.
pub fn records_after(conn: &Connection, device_id: i64, date: NaiveDate) -> AppResult<Vec<ProductionRecord>> {
    many_records(
        conn,
        "SELECT * FROM production_records WHERE device_id = ?1 AND date > ?2 ORDER BY date ASC",
        params![device_id, fmt_date(&date)],
    )
}

/// Number of backfill records strictly between `from` and `to`.
pub fn count_backfill_between(
    conn: &Connection,
    device_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM production_records
         WHERE device_id = ?1 AND date > ?2 AND date < ?3 AND source = 'backfill'",
        params![device_id, fmt_date(&from), fmt_date(&to)],
        |row| row.get(0),
    )?)
}

/// Remove backfill records strictly between `from` and `to`.
pub fn delete_backfill_between(
    conn: &Connection,
    device_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<usize> {
    Ok(conn.execute(
        "DELETE FROM production_records
         WHERE device_id = ?1 AND date > ?2 AND date < ?3 AND source = 'backfill'",
        params![device_id, fmt_date(&from), fmt_date(&to)],
    )?)
}

/// Mean daily value of the non-synthetic records in `[date - window_days, date)`.
/// `None` when there is no history in the window.
pub fn trailing_average(
    conn: &Connection,
    device_id: i64,
    date: NaiveDate,
    window_days: i64,
) -> AppResult<Option<f64>> {
    let from = date - Duration::days(window_days);
    let avg: Option<f64> = conn.query_row(
        "SELECT AVG(daily) FROM production_records
         WHERE device_id = ?1 AND date >= ?2 AND date < ?3 AND source <> 'backfill'",
        params![device_id, fmt_date(&from), fmt_date(&date)],
        |row| row.get(0),
    )?;
    Ok(avg)
}

/// Sum of daily quantities on or after `date`. `None` when the device has no record there.
pub fn sum_daily_since(conn: &Connection, device_id: i64, date: NaiveDate) -> AppResult<Option<i64>> {
    let (count, sum): (i64, Option<i64>) = conn.query_row(
        "SELECT COUNT(*), SUM(daily) FROM production_records WHERE device_id = ?1 AND date >= ?2",
        params![device_id, fmt_date(&date)],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(if count == 0 { None } else { sum })
}

/// Insert or overwrite the record for `(device_id, date)`. The `id` field is ignored.
pub fn upsert_record(conn: &Connection, rec: &ProductionRecord) -> AppResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO production_records
            (device_id, date, daily, weekly, monthly, yearly, counter_value, source, method, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(device_id, date) DO UPDATE SET
            daily = excluded.daily,
            weekly = excluded.weekly,
            monthly = excluded.monthly,
            yearly = excluded.yearly,
            counter_value = excluded.counter_value,
            source = excluded.source,
            method = excluded.method,
            updated_at = excluded.updated_at",
    )?;
    stmt.execute(params![
        rec.device_id,
        rec.date_str(),
        rec.daily,
        rec.totals.weekly,
        rec.totals.monthly,
        rec.totals.yearly,
        rec.counter_value,
        rec.source.to_db_str(),
        rec.method.to_db_str(),
        fmt_ts(&now()),
    ])?;
    Ok(())
}

pub fn update_totals(conn: &Connection, id: i64, totals: &Totals) -> AppResult<()> {
    let mut stmt = conn.prepare_cached(
        "UPDATE production_records SET weekly = ?1, monthly = ?2, yearly = ?3 WHERE id = ?4",
    )?;
    stmt.execute(params![totals.weekly, totals.monthly, totals.yearly, id])?;
    Ok(())
}
