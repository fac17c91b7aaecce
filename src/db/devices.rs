use crate::db::conversion_err;
use crate::errors::{AppError, AppResult};
use crate::models::device::{CalculationMode, Device};
use crate::utils::date::{fmt_ts, now};
use rusqlite::{Connection, OptionalExtension, Row, params};

pub fn map_device(row: &Row) -> rusqlite::Result<Device> {
    let mode_str: String = row.get("calculation_mode")?;
    let calculation_mode = CalculationMode::from_db_str(&mode_str)
        .ok_or_else(|| conversion_err(AppError::InvalidMode(mode_str.clone())))?;

    Ok(Device {
        id: row.get("id")?,
        name: row.get("name")?,
        factory_id: row.get("factory_id")?,
        selected_counter: row.get("selected_counter")?,
        calculation_mode,
        power_threshold: row.get("power_threshold")?,
        created_at: row.get("created_at")?,
    })
}

pub fn insert_device(
    conn: &Connection,
    name: &str,
    factory_id: i64,
    selected_counter: u8,
    mode: CalculationMode,
    power_threshold: f64,
) -> AppResult<i64> {
    if !(1..=4).contains(&selected_counter) {
        return Err(AppError::Config(format!(
            "selected counter must be between 1 and 4, got {selected_counter}"
        )));
    }
    conn.execute(
        "INSERT INTO devices (name, factory_id, selected_counter, calculation_mode, power_threshold, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            name,
            factory_id,
            selected_counter,
            mode.to_db_str(),
            power_threshold,
            fmt_ts(&now()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_device(conn: &Connection, id: i64) -> AppResult<Option<Device>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM devices WHERE id = ?1")?;
    Ok(stmt.query_row([id], map_device).optional()?)
}

/// Resolve a device by numeric id or by name.
pub fn find_device(conn: &Connection, key: &str) -> AppResult<Device> {
    let key = key.trim();
    if let Ok(id) = key.parse::<i64>()
        && let Some(d) = get_device(conn, id)?
    {
        return Ok(d);
    }
    let mut stmt = conn.prepare_cached("SELECT * FROM devices WHERE name = ?1")?;
    stmt.query_row([key], map_device)
        .optional()?
        .ok_or_else(|| AppError::UnknownDevice(key.to_string()))
}

pub fn list_devices(conn: &Connection) -> AppResult<Vec<Device>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM devices ORDER BY id ASC")?;
    let rows = stmt.query_map([], map_device)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn list_devices_by_factory(conn: &Connection, factory_id: i64) -> AppResult<Vec<Device>> {
    let mut stmt =
        conn.prepare_cached("SELECT * FROM devices WHERE factory_id = ?1 ORDER BY id ASC")?;
    let rows = stmt.query_map([factory_id], map_device)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Update the mutable configuration of a device (mode, counter, threshold).
pub fn update_device(conn: &Connection, device: &Device) -> AppResult<()> {
    conn.execute(
        "UPDATE devices
         SET selected_counter = ?1, calculation_mode = ?2, power_threshold = ?3
         WHERE id = ?4",
        params![
            device.selected_counter,
            device.calculation_mode.to_db_str(),
            device.power_threshold,
            device.id,
        ],
    )?;
    Ok(())
}
