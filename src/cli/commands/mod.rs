pub mod batch;
pub mod compute;
pub mod config;
pub mod correct;
pub mod db;
pub mod device;
pub mod ingest;
pub mod init;
pub mod list;
pub mod log;
pub mod power;
pub mod reset;

use crate::config::Config;
use crate::db::initialize::init_db;
use crate::db::pool::DbPool;
use crate::errors::AppResult;
use serde::Serialize;

/// Open the configured database with pending migrations applied.
pub(crate) fn open_pool(cfg: &Config) -> AppResult<DbPool> {
    let mut pool = DbPool::new(&cfg.database)?;
    pool.set_busy_retries(cfg.busy_retries);
    init_db(&pool.conn)?;
    Ok(pool)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
