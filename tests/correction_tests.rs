mod common;
use common::{add_device, cfg_for, d, put_record, test_db};

use milltrack::core::correction::CorrectionLogic;
use milltrack::db::log::load_log;
use milltrack::db::production::{all_records, get_record, list_records};
use milltrack::models::device::CalculationMode;
use milltrack::models::production::RecordSource;

/// 20 per day on 03-01..03-10, then 480 stored on 03-14 with no record in between.
fn distorted_history(db: &common::TestDb, name: &str) -> milltrack::models::device::Device {
    let dev = add_device(&db.pool, name, 1, CalculationMode::Legacy);
    for day in 1..=10 {
        put_record(&db.pool, &dev, &format!("2025-03-{day:02}"), 20);
    }
    put_record(&db.pool, &dev, "2025-03-14", 480);
    dev
}

#[test]
fn dry_run_reports_without_writing() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = distorted_history(&db, "mill-a");
    let before = all_records(&db.pool.conn, dev.id).unwrap();

    let report = CorrectionLogic::scan_and_correct(&mut db.pool, 5.0, Some(&dev), true, &cfg).unwrap();
    assert!(report.dry_run);
    assert_eq!(report.analyzed, 11);
    assert_eq!(report.flagged, 1);
    assert_eq!(report.corrected, 1);
    let item = &report.items[0];
    assert_eq!(item.date, d("2025-03-14"));
    assert_eq!(item.original, 480);
    assert_eq!(item.gap_days, 4);
    assert_eq!(item.per_day, 120);

    let after = all_records(&db.pool.conn, dev.id).unwrap();
    assert_eq!(before, after);
    assert!(load_log(&db.pool.conn).unwrap().iter().all(|e| e.operation != "correct"));
}

#[test]
fn dry_run_and_real_run_agree() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = distorted_history(&db, "mill-a");

    let dry = CorrectionLogic::scan_and_correct(&mut db.pool, 5.0, None, true, &cfg).unwrap();
    let real = CorrectionLogic::scan_and_correct(&mut db.pool, 5.0, None, false, &cfg).unwrap();

    assert_eq!(
        (dry.analyzed, dry.flagged, dry.corrected),
        (real.analyzed, real.flagged, real.corrected)
    );
    let key = |r: &milltrack::core::correction::CorrectionReport| {
        r.items.iter().map(|i| (i.device_id, i.date, i.per_day)).collect::<Vec<_>>()
    };
    assert_eq!(key(&dry), key(&real));

    let gap = list_records(&db.pool.conn, dev.id, d("2025-03-11"), d("2025-03-14")).unwrap();
    assert_eq!(gap.len(), 4);
    assert!(gap.iter().all(|r| r.daily == 120));
    assert_eq!(gap[3].source, RecordSource::Redistributed);
    // cumulative fields chained from the last pre-gap record (Monday 03-10)
    assert_eq!(gap[3].totals.weekly, 20 + 480);
    assert_eq!(gap[3].totals.monthly, 200 + 480);
}

#[test]
fn correction_is_not_repeated() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    distorted_history(&db, "mill-a");

    let first = CorrectionLogic::scan_and_correct(&mut db.pool, 5.0, None, false, &cfg).unwrap();
    assert_eq!(first.corrected, 1);
    let second = CorrectionLogic::scan_and_correct(&mut db.pool, 5.0, None, false, &cfg).unwrap();
    assert_eq!(second.flagged, 0);
    assert_eq!(second.corrected, 0);

    let audits = load_log(&db.pool.conn)
        .unwrap()
        .into_iter()
        .filter(|e| e.operation == "correct")
        .count();
    assert_eq!(audits, 1);
}

#[test]
fn spike_without_gap_is_left_alone() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    for day in 1..=10 {
        put_record(&db.pool, &dev, &format!("2025-03-{day:02}"), 20);
    }
    put_record(&db.pool, &dev, "2025-03-11", 900);

    let report = CorrectionLogic::scan_and_correct(&mut db.pool, 5.0, Some(&dev), false, &cfg).unwrap();
    assert_eq!(report.flagged, 1);
    assert_eq!(report.corrected, 0);
    assert!(!report.items[0].corrected);
    assert_eq!(get_record(&db.pool.conn, dev.id, d("2025-03-11")).unwrap().unwrap().daily, 900);
}

#[test]
fn threshold_controls_flagging() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = distorted_history(&db, "mill-a");

    // 480 is 24× the average: not flagged at 30×
    let report = CorrectionLogic::scan_and_correct(&mut db.pool, 30.0, Some(&dev), true, &cfg).unwrap();
    assert_eq!(report.flagged, 0);
}

#[test]
fn devices_are_scanned_independently() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let a = distorted_history(&db, "mill-a");
    let b = distorted_history(&db, "mill-b");

    let report = CorrectionLogic::scan_and_correct(&mut db.pool, 5.0, Some(&a), false, &cfg).unwrap();
    assert_eq!(report.corrected, 1);
    assert!(get_record(&db.pool.conn, a.id, d("2025-03-12")).unwrap().is_some());
    assert!(get_record(&db.pool.conn, b.id, d("2025-03-12")).unwrap().is_none());
}
