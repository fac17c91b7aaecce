mod common;
use common::{add_device, cfg_for, raw, test_db, ts};

use milltrack::core::power::PowerMonitor;
use milltrack::db::power::{get_status, list_events};
use milltrack::db::samples::insert_sample;
use milltrack::models::device::CalculationMode;
use milltrack::models::power::{PowerEventKind, Severity, Transition};

fn count(events: &[milltrack::models::power::PowerEvent], kind: PowerEventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

#[test]
fn tiny_positive_reading_restores_power() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);

    let first = PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, "2025-03-01 08:00:00", 10, Some(0.0)), &cfg)
        .unwrap();
    assert_eq!(first.transition, Transition::None);
    assert!(!get_status(&db.pool.conn, dev.id).unwrap().unwrap().has_power);

    let out = PowerMonitor::process(
        &mut db.pool,
        &dev,
        &raw(&dev, "2025-03-01 08:01:00", 10, Some(0.0001)),
        &cfg,
    )
    .unwrap();
    assert_eq!(out.transition, Transition::Restore);
    assert_eq!(out.events.len(), 1);
    assert_eq!(out.events[0].kind, PowerEventKind::PowerRestore);
    assert_eq!(out.events[0].severity, Severity::Medium);

    let status = get_status(&db.pool.conn, dev.id).unwrap().unwrap();
    assert!(status.has_power);
    assert_eq!(status.power_restored_at, Some(ts("2025-03-01 08:01:00")));
    assert_eq!(status.power_loss_detected_at, None);
}

#[test]
fn transitions_set_and_clear_opposite_timestamps() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);

    PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, "2025-03-01 08:00:00", 10, Some(3.2)), &cfg).unwrap();
    let loss = PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, "2025-03-01 09:00:00", 10, Some(0.0)), &cfg)
        .unwrap();
    assert_eq!(loss.transition, Transition::Loss);
    assert_eq!(loss.events[0].severity, Severity::High);

    let s = get_status(&db.pool.conn, dev.id).unwrap().unwrap();
    assert!(!s.has_power);
    assert_eq!(s.power_loss_detected_at, Some(ts("2025-03-01 09:00:00")));
    assert_eq!(s.power_restored_at, None);
    assert_eq!(s.counter_at_loss, Some(10));

    PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, "2025-03-01 12:00:00", 10, Some(2.0)), &cfg).unwrap();
    let s = get_status(&db.pool.conn, dev.id).unwrap().unwrap();
    assert!(s.has_power);
    assert_eq!(s.power_loss_detected_at, None);
    assert_eq!(s.power_restored_at, Some(ts("2025-03-01 12:00:00")));

    // the loss is closed by the restore
    let open = list_events(&db.pool.conn, Some(dev.id), true).unwrap();
    assert_eq!(count(&open, PowerEventKind::PowerLoss), 0);
}

#[test]
fn unchanged_state_emits_nothing() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);

    for (i, v) in [1.0, 2.5, 0.7, 4.0].iter().enumerate() {
        let at = format!("2025-03-01 08:0{i}:00");
        let out = PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, &at, 10 + i as i64, Some(*v)), &cfg).unwrap();
        assert_eq!(out.transition, Transition::None);
        assert!(out.events.is_empty());
    }
    assert!(list_events(&db.pool.conn, Some(dev.id), false).unwrap().is_empty());
}

#[test]
fn missing_reading_does_not_flip_state() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);

    PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, "2025-03-01 08:00:00", 10, Some(1.0)), &cfg).unwrap();
    let out = PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, "2025-03-01 08:05:00", 10, None), &cfg).unwrap();
    assert_eq!(out.transition, Transition::None);

    let s = get_status(&db.pool.conn, dev.id).unwrap().unwrap();
    assert!(s.has_power);
    assert_eq!(s.last_checked_at, ts("2025-03-01 08:00:00"));
}

#[test]
fn stale_sample_is_ignored() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);

    PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, "2025-03-01 10:00:00", 10, Some(1.0)), &cfg).unwrap();
    let out = PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, "2025-03-01 09:00:00", 10, Some(0.0)), &cfg)
        .unwrap();
    assert_eq!(out.transition, Transition::None);
    assert!(get_status(&db.pool.conn, dev.id).unwrap().unwrap().has_power);
}

#[test]
fn production_without_power_is_debounced() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);

    let feed = [
        ("2025-03-01 08:00:00", 100, 5.0),
        ("2025-03-01 08:00:30", 100, 0.0), // loss, counter 100
        ("2025-03-01 08:01:00", 101, 0.0), // within noise floor
        ("2025-03-01 08:01:30", 110, 0.0), // alert
        ("2025-03-01 08:03:00", 120, 0.0), // debounced
        ("2025-03-01 08:06:00", 125, 0.0), // still inside 5 minutes
        ("2025-03-01 08:07:00", 130, 0.0), // alert again
    ];
    for (at, counter, ain) in feed {
        PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, at, counter, Some(ain)), &cfg).unwrap();
    }

    let events = list_events(&db.pool.conn, Some(dev.id), false).unwrap();
    let alerts: Vec<_> = events
        .iter()
        .filter(|e| e.kind == PowerEventKind::ProductionWithoutPower)
        .collect();
    assert_eq!(alerts.len(), 2);
    assert!(alerts.iter().all(|e| e.severity == Severity::Critical));
    // newest first
    assert_eq!(alerts[0].counter_delta, Some(30));
    assert_eq!(alerts[1].counter_delta, Some(10));
}

#[test]
fn first_unpowered_sample_sets_baseline() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);

    PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, "2025-03-01 08:00:00", 500, Some(0.0)), &cfg).unwrap();
    let s = get_status(&db.pool.conn, dev.id).unwrap().unwrap();
    assert_eq!(s.power_loss_detected_at, Some(ts("2025-03-01 08:00:00")));

    let out = PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, "2025-03-01 08:10:00", 520, Some(0.0)), &cfg)
        .unwrap();
    assert_eq!(out.events.len(), 1);
    assert_eq!(out.events[0].kind, PowerEventKind::ProductionWithoutPower);
}

#[test]
fn rapid_flapping_raises_one_fluctuation() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);

    let feed = [
        ("2025-03-01 09:00:00", 1.0),
        ("2025-03-01 09:01:00", 0.0),
        ("2025-03-01 09:02:00", 1.0),
        ("2025-03-01 09:03:00", 0.0),
        ("2025-03-01 09:04:00", 1.0),
        ("2025-03-01 09:05:00", 0.0),
    ];
    for (at, ain) in feed {
        PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, at, 10, Some(ain)), &cfg).unwrap();
    }

    let events = list_events(&db.pool.conn, Some(dev.id), false).unwrap();
    assert_eq!(count(&events, PowerEventKind::PowerFluctuation), 1);
    assert_eq!(count(&events, PowerEventKind::PowerLoss), 3);
    assert_eq!(count(&events, PowerEventKind::PowerRestore), 2);
}

#[test]
fn sweep_processes_stored_samples_per_device() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let a = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    let b = add_device(&db.pool, "mill-b", 1, CalculationMode::Legacy);

    for (at, ain) in [("2025-03-01 08:00:00", 1.0), ("2025-03-01 08:05:00", 0.0)] {
        insert_sample(&db.pool.conn, &raw(&a, at, 10, Some(ain))).unwrap();
    }
    insert_sample(&db.pool.conn, &raw(&b, "2025-03-01 08:00:00", 10, Some(1.0))).unwrap();

    let sweep = PowerMonitor::sweep(&mut db.pool, &cfg).unwrap();
    assert_eq!(sweep.report.processed, 2);
    assert_eq!(sweep.report.errors, 0);
    assert_eq!(sweep.samples, 3);
    assert_eq!(sweep.transitions, 1);

    // nothing new: a second sweep sees no samples
    let again = PowerMonitor::sweep(&mut db.pool, &cfg).unwrap();
    assert_eq!(again.samples, 0);
    assert_eq!(again.report.no_data, 2);
}

#[test]
fn resolve_marks_event_once() {
    let mut db = test_db();
    let cfg = cfg_for(&db.path);
    let dev = add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, "2025-03-01 08:00:00", 10, Some(1.0)), &cfg).unwrap();
    let loss = PowerMonitor::process(&mut db.pool, &dev, &raw(&dev, "2025-03-01 08:01:00", 10, Some(0.0)), &cfg)
        .unwrap();
    let id = loss.events[0].id;

    assert!(PowerMonitor::resolve(&mut db.pool, id, ts("2025-03-01 08:30:00")).unwrap());
    assert!(!PowerMonitor::resolve(&mut db.pool, id, ts("2025-03-01 08:31:00")).unwrap());
    assert!(list_events(&db.pool.conn, Some(dev.id), true).unwrap().is_empty());
}
