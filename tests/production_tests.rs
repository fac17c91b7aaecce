mod common;
use common::{add_device, cfg_for, d, daily_samples, put_sample, test_db};

use chrono::{Datelike, NaiveDate};

use milltrack::core::device::DeviceLogic;
use milltrack::core::production::{ProductionLogic, RecomputeOutcome, compute_day};
use milltrack::db::production::{all_records, get_record, list_records};
use milltrack::models::device::CalculationMode;
use milltrack::models::production::{DailyMethod, RecordSource};

#[test]
fn missing_day_yields_no_data_and_no_record() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    put_sample(&db.pool, &dev, "2025-03-01 18:00:00", 100);

    let out = ProductionLogic::recompute(&mut db.pool, &dev, d("2025-03-02"), &cfg).unwrap();
    assert!(matches!(out, RecomputeOutcome::NoData));
    assert!(get_record(&db.pool.conn, dev.id, d("2025-03-02")).unwrap().is_none());
}

#[test]
fn compute_day_does_not_persist() {
    let db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    put_sample(&db.pool, &dev, "2025-03-01 18:00:00", 100);
    put_sample(&db.pool, &dev, "2025-03-02 18:00:00", 160);

    let q = compute_day(&db.pool.conn, &dev, d("2025-03-02"), &cfg).unwrap().unwrap();
    assert_eq!(q.quantity, 60);
    assert!(all_records(&db.pool.conn, dev.id).unwrap().is_empty());
}

#[test]
fn latest_sample_of_each_day_is_used() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    put_sample(&db.pool, &dev, "2025-03-01 08:00:00", 50);
    put_sample(&db.pool, &dev, "2025-03-01 20:00:00", 100);
    put_sample(&db.pool, &dev, "2025-03-02 07:00:00", 110);
    put_sample(&db.pool, &dev, "2025-03-02 19:00:00", 175);

    ProductionLogic::recompute(&mut db.pool, &dev, d("2025-03-02"), &cfg).unwrap();
    let rec = get_record(&db.pool.conn, dev.id, d("2025-03-02")).unwrap().unwrap();
    assert_eq!(rec.daily, 75);
    assert_eq!(rec.counter_value, 175);
    assert_eq!(rec.method, DailyMethod::Difference);
    assert_eq!(rec.source, RecordSource::Sample);
}

#[test]
fn counter_rollback_is_stored_as_assumed_reset() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    put_sample(&db.pool, &dev, "2025-03-01 18:00:00", 9_000);
    put_sample(&db.pool, &dev, "2025-03-02 18:00:00", 35);

    ProductionLogic::recompute(&mut db.pool, &dev, d("2025-03-02"), &cfg).unwrap();
    let rec = get_record(&db.pool.conn, dev.id, d("2025-03-02")).unwrap().unwrap();
    assert_eq!(rec.daily, 35);
    assert_eq!(rec.method, DailyMethod::AssumedReset);
}

#[test]
fn cumulative_totals_equal_sum_since_boundary() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    // 2025-01-25 .. 2025-02-15, counter grows by 10, 11, 12, ...
    let first = d("2025-01-25");
    let mut counter = 1_000;
    for i in 0..22 {
        let day = first + chrono::Duration::days(i);
        counter += 10 + i;
        put_sample(&db.pool, &dev, &format!("{day} 18:00:00"), counter);
    }

    let report =
        ProductionLogic::sweep(&mut db.pool, d("2025-01-26"), d("2025-02-15"), Some(&dev), &cfg).unwrap();
    assert_eq!(report.errors, 0);

    let recs = all_records(&db.pool.conn, dev.id).unwrap();
    assert_eq!(recs.len(), 21);
    for r in &recs {
        assert!(r.daily >= 0);
        let in_range = |from: NaiveDate| -> i64 {
            recs.iter()
                .filter(|x| x.date >= from && x.date <= r.date)
                .map(|x| x.daily)
                .sum()
        };
        let week = milltrack::core::calculator::periods::week_start(r.date);
        let month = r.date.with_day0(0).unwrap();
        let year = NaiveDate::from_ymd_opt(r.date.year(), 1, 1).unwrap();
        assert_eq!(r.totals.weekly, in_range(week), "weekly on {}", r.date);
        assert_eq!(r.totals.monthly, in_range(month), "monthly on {}", r.date);
        assert_eq!(r.totals.yearly, in_range(year), "yearly on {}", r.date);
    }
}

#[test]
fn recompute_is_idempotent() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    daily_samples(&db.pool, &dev, "2025-03-01", 5, 100, 40);

    ProductionLogic::recompute_range(&mut db.pool, &dev, d("2025-03-02"), d("2025-03-05"), &cfg).unwrap();
    let before = all_records(&db.pool.conn, dev.id).unwrap();

    ProductionLogic::recompute(&mut db.pool, &dev, d("2025-03-04"), &cfg).unwrap();
    ProductionLogic::recompute_range(&mut db.pool, &dev, d("2025-03-02"), d("2025-03-05"), &cfg).unwrap();
    let after = all_records(&db.pool.conn, dev.id).unwrap();

    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!((b.date, b.daily, b.totals, b.source), (a.date, a.daily, a.totals, a.source));
    }
}

#[test]
fn late_sample_rechains_later_totals() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    put_sample(&db.pool, &dev, "2025-03-03 18:00:00", 100);
    put_sample(&db.pool, &dev, "2025-03-04 18:00:00", 130);
    put_sample(&db.pool, &dev, "2025-03-05 18:00:00", 170);
    ProductionLogic::recompute_range(&mut db.pool, &dev, d("2025-03-04"), d("2025-03-05"), &cfg).unwrap();

    // the 03-03 record arrives late and is computed after 03-04/03-05
    put_sample(&db.pool, &dev, "2025-03-02 18:00:00", 90);
    ProductionLogic::recompute(&mut db.pool, &dev, d("2025-03-03"), &cfg).unwrap();

    let r5 = get_record(&db.pool.conn, dev.id, d("2025-03-05")).unwrap().unwrap();
    // 10 + 30 + 40, all in the week starting Monday 03-03
    assert_eq!(r5.totals.weekly, 80);
}

#[test]
fn late_sample_between_records_rederives_next_daily() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    put_sample(&db.pool, &dev, "2025-03-03 18:00:00", 1000);
    put_sample(&db.pool, &dev, "2025-03-05 18:00:00", 1060);
    ProductionLogic::recompute_range(&mut db.pool, &dev, d("2025-03-03"), d("2025-03-05"), &cfg).unwrap();
    assert_eq!(get_record(&db.pool.conn, dev.id, d("2025-03-05")).unwrap().unwrap().daily, 60);

    // 03-04 shows up after 03-05 was already computed against 03-03
    put_sample(&db.pool, &dev, "2025-03-04 18:00:00", 1030);
    ProductionLogic::recompute(&mut db.pool, &dev, d("2025-03-04"), &cfg).unwrap();

    let r4 = get_record(&db.pool.conn, dev.id, d("2025-03-04")).unwrap().unwrap();
    let r5 = get_record(&db.pool.conn, dev.id, d("2025-03-05")).unwrap().unwrap();
    assert_eq!(r4.daily, 30);
    assert_eq!(r5.daily, 30);
    assert_eq!(r5.method, DailyMethod::Difference);
    assert_eq!(r5.counter_value, 1060);
    // 1000 (first reading) + 30 + 30
    assert_eq!(r5.totals.weekly, 1060);

    // recomputing the late day again changes nothing
    ProductionLogic::recompute(&mut db.pool, &dev, d("2025-03-04"), &cfg).unwrap();
    assert_eq!(get_record(&db.pool.conn, dev.id, d("2025-03-05")).unwrap().unwrap().daily, 30);
}

#[test]
fn anomalous_jump_after_gap_is_backfilled() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    // 20 units per day from 03-01 to 03-10, nothing on 03-11..03-13
    daily_samples(&db.pool, &dev, "2025-03-01", 10, 1_000, 20);
    put_sample(&db.pool, &dev, "2025-03-14 18:00:00", 1_180 + 480);
    ProductionLogic::recompute_range(&mut db.pool, &dev, d("2025-03-02"), d("2025-03-10"), &cfg).unwrap();

    let out = ProductionLogic::recompute(&mut db.pool, &dev, d("2025-03-14"), &cfg).unwrap();
    let RecomputeOutcome::Backfilled { records } = out else {
        panic!("expected a backfill, got {out:?}");
    };
    assert_eq!(records.len(), 4);

    let gap = list_records(&db.pool.conn, dev.id, d("2025-03-11"), d("2025-03-14")).unwrap();
    assert_eq!(gap.len(), 4);
    assert!(gap.iter().all(|r| r.daily == 120));
    assert_eq!(gap.iter().map(|r| r.daily).sum::<i64>(), 480);
    assert!(gap[..3].iter().all(|r| r.source == RecordSource::Backfill));
    assert_eq!(gap[3].source, RecordSource::Redistributed);
    assert_eq!(gap[3].counter_value, 1_660);

    // Monday 03-10 restarts the week: 20 + 4 × 120
    assert_eq!(gap[3].totals.weekly, 500);
    assert_eq!(gap[3].totals.monthly, 9 * 20 + 480);
    assert_eq!(gap[3].totals.yearly, 9 * 20 + 480);
    assert_eq!(gap[0].totals.weekly, 140);
}

#[test]
fn backfill_is_idempotent() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    daily_samples(&db.pool, &dev, "2025-03-01", 10, 1_000, 20);
    put_sample(&db.pool, &dev, "2025-03-14 18:00:00", 1_660);

    ProductionLogic::recompute_range(&mut db.pool, &dev, d("2025-03-02"), d("2025-03-14"), &cfg).unwrap();
    let first = all_records(&db.pool.conn, dev.id).unwrap();
    ProductionLogic::recompute_range(&mut db.pool, &dev, d("2025-03-02"), d("2025-03-14"), &cfg).unwrap();
    let second = all_records(&db.pool.conn, dev.id).unwrap();

    assert_eq!(first.len(), 13);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!((a.date, a.daily, a.totals, a.source), (b.date, b.daily, b.totals, b.source));
    }
}

#[test]
fn ordinary_gap_is_left_absent() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    daily_samples(&db.pool, &dev, "2025-03-01", 10, 1_000, 20);
    put_sample(&db.pool, &dev, "2025-03-14 18:00:00", 1_180 + 60);
    ProductionLogic::recompute_range(&mut db.pool, &dev, d("2025-03-02"), d("2025-03-14"), &cfg).unwrap();

    assert!(get_record(&db.pool.conn, dev.id, d("2025-03-12")).unwrap().is_none());
    let r = get_record(&db.pool.conn, dev.id, d("2025-03-14")).unwrap().unwrap();
    assert_eq!(r.daily, 60);
    assert_eq!(r.source, RecordSource::Sample);
}

#[test]
fn reset_aware_device_uses_reset_log() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-r", 1, CalculationMode::ResetAware);
    put_sample(&db.pool, &dev, "2025-03-01 18:00:00", 5_000);
    put_sample(&db.pool, &dev, "2025-03-02 18:00:00", 5_400);
    put_sample(&db.pool, &dev, "2025-03-03 18:00:00", 250);
    put_sample(&db.pool, &dev, "2025-03-04 18:00:00", 600);

    DeviceLogic::record_reset(&mut db.pool, &dev, common::ts("2025-03-03 00:01:00"), 5_420, "nightly", true)
        .unwrap();
    ProductionLogic::recompute_range(&mut db.pool, &dev, d("2025-03-02"), d("2025-03-04"), &cfg).unwrap();

    let recs = all_records(&db.pool.conn, dev.id).unwrap();
    let by_day: Vec<(i64, DailyMethod)> = recs.iter().map(|r| (r.daily, r.method)).collect();
    assert_eq!(
        by_day,
        vec![
            (400, DailyMethod::Difference),
            (250, DailyMethod::ResetLog),
            (350, DailyMethod::Difference),
        ]
    );
}

#[test]
fn failed_reset_falls_back_to_difference() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-r", 1, CalculationMode::ResetAware);
    put_sample(&db.pool, &dev, "2025-03-01 18:00:00", 5_000);
    put_sample(&db.pool, &dev, "2025-03-02 18:00:00", 5_300);
    DeviceLogic::record_reset(&mut db.pool, &dev, common::ts("2025-03-02 00:01:00"), 5_000, "nightly", false)
        .unwrap();

    ProductionLogic::recompute(&mut db.pool, &dev, d("2025-03-02"), &cfg).unwrap();
    let r = get_record(&db.pool.conn, dev.id, d("2025-03-02")).unwrap().unwrap();
    assert_eq!((r.daily, r.method), (300, DailyMethod::Difference));
}

#[test]
fn sweep_isolates_devices_without_data() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let a = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    let _b = add_device(&db.pool, "mill-b", 1, CalculationMode::Legacy);
    put_sample(&db.pool, &a, "2025-03-01 18:00:00", 100);
    put_sample(&db.pool, &a, "2025-03-02 18:00:00", 150);

    let report = ProductionLogic::sweep(&mut db.pool, d("2025-03-02"), d("2025-03-02"), None, &cfg).unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.updated, 1);
    assert_eq!(report.no_data, 1);
    assert_eq!(report.errors, 0);
}
