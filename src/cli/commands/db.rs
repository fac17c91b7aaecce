use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::db::migrate::{applied_versions, run_pending_migrations};
use crate::db::pool::DbPool;
use crate::db::stats;
use crate::errors::AppResult;
use crate::ui::messages::{error, header, info, success};

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    if let Commands::Db {
        migrate,
        check,
        vacuum,
        info: show_info,
    } = &cli.command
    {
        let pool = DbPool::new(&cfg.database)?;

        if *migrate {
            info("Running migrations…");
            let n = run_pending_migrations(&pool.conn)?;
            success(format!("{n} migration(s) applied."));
        }

        if *show_info {
            let db = stats::db_info(&pool.conn, &cfg.database)?;
            if cli.json {
                super::print_json(&db)?;
            } else {
                header("Database");
                println!("{:<14} {}", "Path:", db.path);
                println!("{:<14} {} bytes", "Size:", db.size_bytes);
                println!("{:<14} {}", "Devices:", db.devices);
                println!("{:<14} {}", "Samples:", db.samples);
                println!("{:<14} {}", "Records:", db.records);
                println!("{:<14} {}", "Open events:", db.open_events);
                println!("{:<14} {}", "Batches:", db.batches);
                println!(
                    "{:<14} {} .. {}",
                    "Samples span:",
                    db.first_sample.as_deref().unwrap_or("-"),
                    db.last_sample.as_deref().unwrap_or("-")
                );
                println!("{:<14} {}", "Migrations:", applied_versions(&pool.conn)?.len());
            }
        }

        if *check {
            info("Running integrity check…");
            let integrity = stats::integrity_check(&pool.conn)?;
            if integrity == "ok" {
                success("Integrity check passed.");
            } else {
                error(format!("Integrity check failed: {integrity}"));
            }
        }

        if *vacuum {
            info("Running VACUUM…");
            pool.conn.execute_batch("VACUUM;")?;
            success("Vacuum completed.");
        }
    }

    Ok(())
}
