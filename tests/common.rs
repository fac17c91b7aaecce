#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use chrono::{NaiveDate, NaiveDateTime};
use milltrack::config::Config;
use milltrack::core::calculator::periods::next_totals;
use milltrack::db::initialize::init_db;
use milltrack::db::pool::DbPool;
use milltrack::db::{devices, production, samples};
use milltrack::models::device::{CalculationMode, Device};
use milltrack::models::production::{DailyMethod, ProductionRecord, RecordSource};
use milltrack::models::sample::RawSample;
use std::fs;
use tempfile::TempDir;

pub fn mt() -> Command {
    cargo_bin_cmd!("milltrack")
}

/// A migrated database inside its own temp dir. Keep the struct alive for the
/// duration of the test.
pub struct TestDb {
    pub dir: TempDir,
    pub path: String,
    pub pool: DbPool,
}

pub fn test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("milltrack.sqlite").to_string_lossy().to_string();
    let pool = DbPool::new(&path).expect("open db");
    init_db(&pool.conn).expect("migrate");
    TestDb { dir, path, pool }
}

/// Defaults, pointed at `path`.
pub fn cfg_for(path: &str) -> Config {
    Config {
        database: path.to_string(),
        ..Config::default()
    }
}

/// Write a file into the test dir and return its path.
pub fn write_file(db: &TestDb, name: &str, content: &str) -> String {
    let p = db.dir.path().join(name);
    fs::write(&p, content).expect("write file");
    p.to_string_lossy().to_string()
}

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
}

pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").expect("timestamp")
}

pub fn add_device(pool: &DbPool, name: &str, factory: i64, mode: CalculationMode) -> Device {
    let id = devices::insert_device(&pool.conn, name, factory, 1, mode, 0.0).expect("insert device");
    devices::get_device(&pool.conn, id).expect("load").expect("device exists")
}

pub fn raw(device: &Device, at: &str, counter: i64, ain1: Option<f64>) -> RawSample {
    RawSample {
        id: 0,
        device_id: device.id,
        timestamp: ts(at),
        counters: [counter, 0, 0, 0],
        analog: [ain1, None, None, None],
        digital: [None; 4],
    }
}

/// Store a powered sample with `counter` in slot 1.
pub fn put_sample(pool: &DbPool, device: &Device, at: &str, counter: i64) {
    samples::insert_sample(&pool.conn, &raw(device, at, counter, Some(1.0))).expect("insert sample");
}

/// Store a daily record directly, chaining totals from the previous one.
pub fn put_record(pool: &DbPool, device: &Device, date: &str, daily: i64) {
    let date = d(date);
    let previous = production::previous_record(&pool.conn, device.id, date).expect("previous");
    let rec = ProductionRecord {
        id: 0,
        device_id: device.id,
        date,
        daily,
        totals: next_totals(previous.map(|p| (p.date, p.totals)), date, daily),
        counter_value: 0,
        source: RecordSource::Sample,
        method: DailyMethod::Difference,
        updated_at: String::new(),
    };
    production::upsert_record(&pool.conn, &rec).expect("upsert record");
}

/// One sample per day from `first` for `days` days, counter starting at
/// `start` and growing by `per_day`.
pub fn daily_samples(pool: &DbPool, device: &Device, first: &str, days: i64, start: i64, per_day: i64) {
    let first = d(first);
    for i in 0..days {
        let day = first + chrono::Duration::days(i);
        put_sample(pool, device, &format!("{day} 18:00:00"), start + per_day * i);
    }
}
