use crate::db::ts_col;
use crate::errors::AppResult;
use crate::models::device::Device;
use crate::models::sample::{CounterReading, RawSample};
use crate::utils::date::{day_end, day_start, fmt_ts, now};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, Row, params};

pub fn map_sample(row: &Row) -> rusqlite::Result<RawSample> {
    Ok(RawSample {
        id: row.get("id")?,
        device_id: row.get("device_id")?,
        timestamp: ts_col(row, "timestamp")?,
        counters: [
            row.get("counter_1")?,
            row.get("counter_2")?,
            row.get("counter_3")?,
            row.get("counter_4")?,
        ],
        analog: [
            row.get("ain1")?,
            row.get("ain2")?,
            row.get("ain3")?,
            row.get("ain4")?,
        ],
        digital: [
            row.get("din1")?,
            row.get("din2")?,
            row.get("din3")?,
            row.get("din4")?,
        ],
    })
}

/// Store a sample. Returns `false` when the dedup key already exists.
pub fn insert_sample(conn: &Connection, s: &RawSample) -> AppResult<bool> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO raw_samples
            (device_id, timestamp, counter_1, counter_2, counter_3, counter_4,
             ain1, ain2, ain3, ain4, din1, din2, din3, din4, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    )?;
    let changed = stmt.execute(params![
        s.device_id,
        s.ts_str(),
        s.counters[0],
        s.counters[1],
        s.counters[2],
        s.counters[3],
        s.analog[0],
        s.analog[1],
        s.analog[2],
        s.analog[3],
        s.digital[0],
        s.digital[1],
        s.digital[2],
        s.digital[3],
        fmt_ts(&now()),
    ])?;
    Ok(changed == 1)
}

fn one_sample(conn: &Connection, sql: &str, p: impl rusqlite::Params) -> AppResult<Option<RawSample>> {
    let mut stmt = conn.prepare_cached(sql)?;
    Ok(stmt.query_row(p, map_sample).optional()?)
}

fn reading(device: &Device, sample: Option<RawSample>) -> Option<CounterReading> {
    sample.map(|s| CounterReading {
        timestamp: s.timestamp,
        value: device.counter_of(&s),
    })
}

/// Latest reading taken on `date`.
pub fn reading_on(conn: &Connection, device: &Device, date: NaiveDate) -> AppResult<Option<CounterReading>> {
    let s = one_sample(
        conn,
        "SELECT * FROM raw_samples
         WHERE device_id = ?1 AND timestamp >= ?2 AND timestamp < ?3
         ORDER BY timestamp DESC, id DESC LIMIT 1",
        params![device.id, fmt_ts(&day_start(date)), fmt_ts(&day_end(date))],
    )?;
    Ok(reading(device, s))
}

/// Latest reading strictly before `date`, searching back at most `lookback_days`.
pub fn reading_before(
    conn: &Connection,
    device: &Device,
    date: NaiveDate,
    lookback_days: i64,
) -> AppResult<Option<CounterReading>> {
    let floor = day_start(date - Duration::days(lookback_days));
    let s = one_sample(
        conn,
        "SELECT * FROM raw_samples
         WHERE device_id = ?1 AND timestamp >= ?2 AND timestamp < ?3
         ORDER BY timestamp DESC, id DESC LIMIT 1",
        params![device.id, fmt_ts(&floor), fmt_ts(&day_start(date))],
    )?;
    Ok(reading(device, s))
}

pub fn latest_sample(conn: &Connection, device_id: i64) -> AppResult<Option<RawSample>> {
    one_sample(
        conn,
        "SELECT * FROM raw_samples WHERE device_id = ?1
         ORDER BY timestamp DESC, id DESC LIMIT 1",
        [device_id],
    )
}

pub fn first_sample_at_or_after(
    conn: &Connection,
    device_id: i64,
    ts: NaiveDateTime,
) -> AppResult<Option<RawSample>> {
    one_sample(
        conn,
        "SELECT * FROM raw_samples WHERE device_id = ?1 AND timestamp >= ?2
         ORDER BY timestamp ASC, id ASC LIMIT 1",
        params![device_id, fmt_ts(&ts)],
    )
}

/// Samples newer than `after` (all samples when `None`), oldest first.
pub fn samples_after(
    conn: &Connection,
    device_id: i64,
    after: Option<NaiveDateTime>,
) -> AppResult<Vec<RawSample>> {
    let mut stmt = conn.prepare_cached(
        "SELECT * FROM raw_samples WHERE device_id = ?1 AND timestamp > ?2
         ORDER BY timestamp ASC, id ASC",
    )?;
    let after = after.map(|t| fmt_ts(&t)).unwrap_or_default();
    let rows = stmt.query_map(params![device_id, after], map_sample)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn count_samples(conn: &Connection, device_id: i64) -> AppResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM raw_samples WHERE device_id = ?1",
        [device_id],
        |row| row.get(0),
    )?)
}
