//! SQLite connection wrapper, the storage handle injected into every service.

use crate::db::locks::DeviceLocks;
use crate::errors::{AppError, AppResult};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

pub struct DbPool {
    pub conn: Connection,
    locks: Arc<DeviceLocks>,
    busy_retries: u32,
}

impl DbPool {
    pub fn new(path: &str) -> AppResult<Self> {
        Self::with_locks(path, Arc::new(DeviceLocks::new()))
    }

    /// Open another pool on the same database that shares `locks` with its siblings.
    pub fn with_locks(path: &str, locks: Arc<DeviceLocks>) -> AppResult<Self> {
        let conn = Connection::open(Path::new(path))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn,
            locks,
            busy_retries: 3,
        })
    }

    pub fn locks(&self) -> Arc<DeviceLocks> {
        Arc::clone(&self.locks)
    }

    pub fn set_busy_retries(&mut self, retries: u32) {
        self.busy_retries = retries;
    }

    /// Run `func` inside one IMMEDIATE transaction while holding the device's lock.
    ///
    /// With `dry_run` the transaction is rolled back after `func` returns, so the
    /// caller follows the exact same path without persisting anything. A busy
    /// database is retried `busy_retries` times, then reported as
    /// [`AppError::ConcurrencyConflict`].
    pub fn with_device_tx<F, T>(&mut self, device_id: i64, dry_run: bool, mut func: F) -> AppResult<T>
    where
        F: FnMut(&Transaction) -> AppResult<T>,
    {
        let lock = self.locks.for_device(device_id);
        let _guard = lock.lock();

        let mut attempt = 0;
        loop {
            match Self::run_tx(&mut self.conn, dry_run, &mut func) {
                Ok(v) => return Ok(v),
                Err(e) if e.is_busy() && attempt < self.busy_retries => {
                    attempt += 1;
                    tracing::warn!(device_id, attempt, "database busy, retrying device update");
                    std::thread::sleep(RETRY_BACKOFF * attempt);
                }
                Err(e) if e.is_busy() => return Err(AppError::ConcurrencyConflict(device_id)),
                Err(e) => return Err(e),
            }
        }
    }

    /// Same as [`DbPool::with_device_tx`] for work that is not tied to one device.
    pub fn with_tx<F, T>(&mut self, dry_run: bool, mut func: F) -> AppResult<T>
    where
        F: FnMut(&Transaction) -> AppResult<T>,
    {
        Self::run_tx(&mut self.conn, dry_run, &mut func)
    }

    fn run_tx<F, T>(conn: &mut Connection, dry_run: bool, func: &mut F) -> AppResult<T>
    where
        F: FnMut(&Transaction) -> AppResult<T>,
    {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = func(&tx)?;
        if dry_run {
            tx.rollback()?;
        } else {
            tx.commit()?;
        }
        Ok(out)
    }
}
