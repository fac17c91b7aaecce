use rusqlite::{Connection, OptionalExtension, Result};

/// Ensure that the `log` table exists with the modern schema.
fn ensure_log_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS log (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            date      TEXT NOT NULL,
            operation TEXT NOT NULL,
            target    TEXT DEFAULT '',
            message   TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

struct Migration {
    version: &'static str,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "20250301_0001_core_tables",
        description: "Created devices, raw_samples, production_records and reset_logs",
        sql: r#"
        CREATE TABLE IF NOT EXISTS devices (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            name             TEXT NOT NULL UNIQUE,
            factory_id       INTEGER NOT NULL DEFAULT 0,
            selected_counter INTEGER NOT NULL DEFAULT 1 CHECK (selected_counter BETWEEN 1 AND 4),
            calculation_mode TEXT NOT NULL DEFAULT 'legacy' CHECK (calculation_mode IN ('legacy','reset_aware')),
            power_threshold  REAL NOT NULL DEFAULT 0.0,
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS raw_samples (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id  INTEGER NOT NULL REFERENCES devices(id),
            timestamp  TEXT NOT NULL,             -- YYYY-MM-DD HH:MM:SS, plant local
            counter_1  INTEGER NOT NULL DEFAULT 0,
            counter_2  INTEGER NOT NULL DEFAULT 0,
            counter_3  INTEGER NOT NULL DEFAULT 0,
            counter_4  INTEGER NOT NULL DEFAULT 0,
            ain1       REAL,                      -- power indicator
            ain2       REAL,
            ain3       REAL,
            ain4       REAL,
            din1       INTEGER,
            din2       INTEGER,
            din3       INTEGER,
            din4       INTEGER,
            created_at TEXT NOT NULL,
            UNIQUE (device_id, timestamp, counter_1, counter_2, counter_3, counter_4)
        );

        CREATE INDEX IF NOT EXISTS idx_samples_device_ts ON raw_samples(device_id, timestamp);

        CREATE TABLE IF NOT EXISTS production_records (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id     INTEGER NOT NULL REFERENCES devices(id),
            date          TEXT NOT NULL,          -- YYYY-MM-DD
            daily         INTEGER NOT NULL DEFAULT 0 CHECK (daily >= 0),
            weekly        INTEGER NOT NULL DEFAULT 0,
            monthly       INTEGER NOT NULL DEFAULT 0,
            yearly        INTEGER NOT NULL DEFAULT 0,
            counter_value INTEGER NOT NULL DEFAULT 0,
            updated_at    TEXT NOT NULL,
            UNIQUE (device_id, date)
        );

        CREATE TABLE IF NOT EXISTS reset_logs (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id      INTEGER NOT NULL REFERENCES devices(id),
            reset_at       TEXT NOT NULL,
            counter_before INTEGER NOT NULL DEFAULT 0,
            reason         TEXT NOT NULL DEFAULT '',
            success        INTEGER NOT NULL DEFAULT 1,
            created_at     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_resets_device_at ON reset_logs(device_id, reset_at);
        "#,
    },
    Migration {
        version: "20250301_0002_power_tables",
        description: "Created power_status and power_events",
        sql: r#"
        CREATE TABLE IF NOT EXISTS power_status (
            device_id                INTEGER PRIMARY KEY REFERENCES devices(id),
            has_power                INTEGER NOT NULL,
            last_value               REAL,
            last_checked_at          TEXT NOT NULL,
            power_loss_detected_at   TEXT,
            power_restored_at        TEXT,
            threshold                REAL NOT NULL DEFAULT 0.0,
            counter_at_loss          INTEGER,
            last_suspicious_alert_at TEXT
        );

        CREATE TABLE IF NOT EXISTS power_events (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id     INTEGER NOT NULL REFERENCES devices(id),
            kind          TEXT NOT NULL CHECK (kind IN ('power_loss','power_restore','production_without_power','power_fluctuation')),
            severity      TEXT NOT NULL CHECK (severity IN ('low','medium','high','critical')),
            occurred_at   TEXT NOT NULL,
            value         REAL,
            counter_delta INTEGER,
            message       TEXT NOT NULL DEFAULT '',
            resolved      INTEGER NOT NULL DEFAULT 0,
            resolved_at   TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_power_events_device ON power_events(device_id, occurred_at);
        "#,
    },
    Migration {
        version: "20250301_0003_batches",
        description: "Created batches",
        sql: r#"
        CREATE TABLE IF NOT EXISTS batches (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL,
            factory_id      INTEGER NOT NULL DEFAULT 0,
            start_date      TEXT NOT NULL,
            start_value     INTEGER NOT NULL DEFAULT 0,
            current_value   INTEGER NOT NULL DEFAULT 0,
            expected_output REAL NOT NULL DEFAULT 0.0,
            actual_output   REAL NOT NULL DEFAULT 0.0,
            waste_factor    REAL NOT NULL DEFAULT 0.0,
            status          TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending','approved','in_process','paused','stopped','completed','rejected')),
            is_completed    INTEGER NOT NULL DEFAULT 0,
            completed_at    TEXT,
            data_source     TEXT,
            updated_at      TEXT NOT NULL
        );
        "#,
    },
    Migration {
        version: "20250412_0004_record_provenance",
        description: "Added source and method provenance to production_records",
        sql: r#"
        ALTER TABLE production_records ADD COLUMN source TEXT NOT NULL DEFAULT 'sample';
        ALTER TABLE production_records ADD COLUMN method TEXT NOT NULL DEFAULT 'difference';
        CREATE INDEX IF NOT EXISTS idx_records_device_date ON production_records(device_id, date);
        "#,
    },
];

fn is_applied(conn: &Connection, version: &str) -> Result<bool> {
    let mut chk = conn.prepare(
        "SELECT 1 FROM log
         WHERE operation = 'migration_applied' AND target = ?1
         LIMIT 1",
    )?;
    Ok(chk.query_row([version], |_| Ok(())).optional()?.is_some())
}

/// Versions of all migrations already applied, oldest first.
pub fn applied_versions(conn: &Connection) -> Result<Vec<String>> {
    ensure_log_table(conn)?;
    let mut stmt = conn.prepare(
        "SELECT target FROM log WHERE operation = 'migration_applied' ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect()
}

/// Public entry point: run all pending migrations.
///
/// Each migration runs in its own transaction together with the `log` row
/// that marks it applied, so a failed step leaves no partial schema behind.
pub fn run_pending_migrations(conn: &Connection) -> Result<usize> {
    ensure_log_table(conn)?;

    let mut applied = 0;
    for m in MIGRATIONS {
        if is_applied(conn, m.version)? {
            continue;
        }

        conn.execute_batch("BEGIN;")?;
        let step = conn.execute_batch(m.sql).and_then(|_| {
            conn.execute(
                "INSERT INTO log (date, operation, target, message)
                 VALUES (datetime('now', 'localtime'), 'migration_applied', ?1, ?2)",
                [m.version, m.description],
            )
        });

        match step {
            Ok(_) => {
                conn.execute_batch("COMMIT;")?;
                tracing::info!(version = m.version, "migration applied");
                applied += 1;
            }
            Err(e) => {
                conn.execute_batch("ROLLBACK;")?;
                return Err(e);
            }
        }
    }

    Ok(applied)
}
