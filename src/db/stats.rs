use crate::errors::AppResult;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::fs;

#[derive(Debug, Clone, Serialize)]
pub struct DbInfo {
    pub path: String,
    pub size_bytes: u64,
    pub devices: i64,
    pub samples: i64,
    pub records: i64,
    pub open_events: i64,
    pub batches: i64,
    pub first_sample: Option<String>,
    pub last_sample: Option<String>,
}

fn count(conn: &Connection, sql: &str) -> rusqlite::Result<i64> {
    conn.query_row(sql, [], |row| row.get(0))
}

pub fn db_info(conn: &Connection, db_path: &str) -> AppResult<DbInfo> {
    let size_bytes = fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    let first_sample: Option<String> = conn
        .query_row(
            "SELECT timestamp FROM raw_samples ORDER BY timestamp ASC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    let last_sample: Option<String> = conn
        .query_row(
            "SELECT timestamp FROM raw_samples ORDER BY timestamp DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(DbInfo {
        path: db_path.to_string(),
        size_bytes,
        devices: count(conn, "SELECT COUNT(*) FROM devices")?,
        samples: count(conn, "SELECT COUNT(*) FROM raw_samples")?,
        records: count(conn, "SELECT COUNT(*) FROM production_records")?,
        open_events: count(conn, "SELECT COUNT(*) FROM power_events WHERE resolved = 0")?,
        batches: count(conn, "SELECT COUNT(*) FROM batches")?,
        first_sample,
        last_sample,
    })
}

pub fn integrity_check(conn: &Connection) -> AppResult<String> {
    Ok(conn.query_row("PRAGMA integrity_check;", [], |row| row.get(0))?)
}
