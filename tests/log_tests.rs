mod common;
use common::{add_device, test_db};

use milltrack::core::log::render_log;
use milltrack::db::log::{LogEntry, audit, load_log};
use milltrack::models::device::CalculationMode;
use regex::Regex;

fn entry(id: i64, operation: &str, target: &str, message: &str) -> LogEntry {
    LogEntry {
        id,
        date: "2025-03-01 08:00:00".to_string(),
        operation: operation.to_string(),
        target: target.to_string(),
        message: message.to_string(),
    }
}

fn strip(s: &str) -> String {
    Regex::new(r"\x1B\[[0-9;]*[mK]").unwrap().replace_all(s, "").to_string()
}

#[test]
fn columns_line_up_regardless_of_colour() {
    let entries = vec![
        entry(1, "init", "", "database created"),
        entry(12, "device_add", "mill-a", "factory 1, counter 1"),
    ];
    let lines = render_log(&entries).unwrap();
    assert_eq!(lines.len(), 2);

    let plain: Vec<String> = lines.iter().map(|l| strip(l)).collect();
    let arrow = |l: &str| l.find(" => ").unwrap();
    assert_eq!(arrow(&plain[0]), arrow(&plain[1]));
    assert!(plain[0].starts_with(" 1: "));
    assert!(plain[1].contains("device_add (mill-a)"));
    assert!(plain[1].ends_with("=> factory 1, counter 1"));
}

#[test]
fn long_targets_are_truncated() {
    let target = "x".repeat(100);
    let lines = render_log(&[entry(1, "correct", &target, "spread")]).unwrap();
    let plain = strip(&lines[0]);

    let column = plain.split(" | ").nth(1).unwrap().split(" => ").next().unwrap();
    assert_eq!(column.chars().count(), 60);
    assert!(column.ends_with("..."));
}

#[test]
fn audit_rows_are_read_back_in_order() {
    let db = test_db();
    add_device(&db.pool, "mill-a", 1, CalculationMode::Legacy);
    audit(&db.pool.conn, "reset", "mill-a", "counter 9000 cleared").unwrap();
    audit(&db.pool.conn, "batch_add", "", "B-1").unwrap();

    let log = load_log(&db.pool.conn).unwrap();
    let tail: Vec<_> = log.iter().rev().take(2).map(|e| e.operation.as_str()).collect();
    assert_eq!(tail, vec!["batch_add", "reset"]);
    assert!(log.windows(2).all(|w| w[0].id < w[1].id));
}
