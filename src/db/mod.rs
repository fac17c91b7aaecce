pub mod batches;
pub mod devices;
pub mod initialize;
pub mod locks;
pub mod log;
pub mod migrate;
pub mod pool;
pub mod power;
pub mod production;
pub mod resets;
pub mod samples;
pub mod stats;

use crate::errors::AppError;
use crate::utils::date::{DATE_FORMAT, TS_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Row;

/// Wrap a domain parse failure so it can travel through a rusqlite row mapper.
pub(crate) fn conversion_err(err: AppError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
}

pub(crate) fn ts_col(row: &Row, col: &str) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(col)?;
    NaiveDateTime::parse_from_str(&raw, TS_FORMAT)
        .map_err(|_| conversion_err(AppError::InvalidDate(raw.clone())))
}

pub(crate) fn opt_ts_col(row: &Row, col: &str) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(col)?;
    match raw {
        None => Ok(None),
        Some(s) => NaiveDateTime::parse_from_str(&s, TS_FORMAT)
            .map(Some)
            .map_err(|_| conversion_err(AppError::InvalidDate(s.clone()))),
    }
}

pub(crate) fn date_col(row: &Row, col: &str) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(col)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|_| conversion_err(AppError::InvalidDate(raw.clone())))
}
