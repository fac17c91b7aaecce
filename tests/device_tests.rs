mod common;
use common::{cfg_for, d, daily_samples, test_db, ts};

use milltrack::core::device::{DeviceChanges, DeviceLogic};
use milltrack::core::production::ProductionLogic;
use milltrack::db::devices::{find_device, list_devices_by_factory};
use milltrack::db::log::load_log;
use milltrack::db::production::get_record;
use milltrack::db::resets::list_resets;
use milltrack::errors::AppError;
use milltrack::models::device::CalculationMode;
use milltrack::models::production::DailyMethod;

#[test]
fn add_validates_and_audits() {
    let mut db = test_db();
    let dev = DeviceLogic::add(&mut db.pool, "mill-a", 3, 2, CalculationMode::ResetAware, 0.5).unwrap();
    assert_eq!(dev.selected_counter, 2);
    assert_eq!(dev.calculation_mode, CalculationMode::ResetAware);
    assert_eq!(find_device(&db.pool.conn, "mill-a").unwrap().id, dev.id);
    assert_eq!(list_devices_by_factory(&db.pool.conn, 3).unwrap().len(), 1);

    assert!(matches!(
        DeviceLogic::add(&mut db.pool, " ", 3, 1, CalculationMode::Legacy, 0.0),
        Err(AppError::Config(_))
    ));
    assert!(matches!(
        DeviceLogic::add(&mut db.pool, "mill-b", 3, 5, CalculationMode::Legacy, 0.0),
        Err(AppError::Config(_))
    ));
    assert!(load_log(&db.pool.conn).unwrap().iter().any(|e| e.operation == "device_add"));
}

#[test]
fn set_changes_only_given_fields() {
    let mut db = test_db();
    let dev = DeviceLogic::add(&mut db.pool, "mill-a", 1, 1, CalculationMode::Legacy, 0.0).unwrap();

    let changes = DeviceChanges {
        calculation_mode: Some(CalculationMode::ResetAware),
        ..Default::default()
    };
    let updated = DeviceLogic::set(&mut db.pool, &dev, &changes).unwrap();
    assert_eq!(updated.calculation_mode, CalculationMode::ResetAware);
    assert_eq!(updated.selected_counter, 1);

    let stored = find_device(&db.pool.conn, "mill-a").unwrap();
    assert_eq!(stored.calculation_mode, CalculationMode::ResetAware);

    let bad = DeviceChanges {
        selected_counter: Some(0),
        ..Default::default()
    };
    assert!(DeviceLogic::set(&mut db.pool, &dev, &bad).is_err());
}

#[test]
fn recorded_reset_drives_reset_aware_days() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = DeviceLogic::add(&mut db.pool, "mill-a", 1, 1, CalculationMode::ResetAware, 0.0).unwrap();
    daily_samples(&db.pool, &dev, "2025-03-03", 2, 9_000, 100);
    // counter cleared overnight, then 40 units produced
    daily_samples(&db.pool, &dev, "2025-03-05", 1, 40, 0);

    DeviceLogic::record_reset(&mut db.pool, &dev, ts("2025-03-05 00:05:00"), 9_100, "nightly", true).unwrap();
    DeviceLogic::record_reset(&mut db.pool, &dev, ts("2025-03-06 00:05:00"), 40, "nightly", false).unwrap();

    let resets = list_resets(&db.pool.conn, dev.id).unwrap();
    assert_eq!(resets.len(), 2);
    assert!(resets[0].success && !resets[1].success);

    ProductionLogic::recompute_range(&mut db.pool, &dev, d("2025-03-03"), d("2025-03-05"), &cfg).unwrap();
    let rec = get_record(&db.pool.conn, dev.id, d("2025-03-05")).unwrap().unwrap();
    assert_eq!(rec.daily, 40);
    assert_eq!(rec.method, DailyMethod::ResetLog);

    let audits = load_log(&db.pool.conn)
        .unwrap()
        .into_iter()
        .filter(|e| e.operation == "reset")
        .count();
    assert_eq!(audits, 2);
}
