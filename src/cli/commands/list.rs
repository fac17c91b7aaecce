use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::db::devices::find_device;
use crate::db::production::list_records;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{header, info};
use crate::utils::date::{period_bounds, today};
use chrono::Datelike;

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let Commands::List { device, period } = &cli.command else {
        return Ok(());
    };

    let (from, to) = match period {
        Some(p) => period_bounds(p).map_err(AppError::InvalidDate)?,
        None => {
            let t = today();
            let first = t.with_day(1).unwrap_or(t);
            (first, t)
        }
    };

    let pool = super::open_pool(cfg)?;
    let dev = find_device(&pool.conn, device)?;
    let records = list_records(&pool.conn, dev.id, from, to)?;

    if cli.json {
        return super::print_json(&records);
    }
    if records.is_empty() {
        info(format!("No production records for {} in {from}..{to}", dev.name));
        return Ok(());
    }

    header(format!("{} ({from} .. {to})", dev.name));
    println!(
        "{:<10} {:>9} {:>9} {:>10} {:>11} {:>11}  {:<13} {}",
        "DATE", "DAILY", "WEEKLY", "MONTHLY", "YEARLY", "COUNTER", "SOURCE", "METHOD"
    );
    for r in &records {
        println!(
            "{:<10} {:>9} {:>9} {:>10} {:>11} {:>11}  {:<13} {}",
            r.date_str(),
            r.daily,
            r.totals.weekly,
            r.totals.monthly,
            r.totals.yearly,
            r.counter_value,
            r.source.to_db_str(),
            r.method.to_db_str()
        );
    }
    let total: i64 = records.iter().map(|r| r.daily).sum();
    println!("\n{:<10} {:>9}", "TOTAL", total);
    Ok(())
}
