use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::core::production::{ProductionLogic, RecomputeOutcome};
use crate::db::devices::find_device;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{info, success, warning};
use crate::utils::date::parse_date;

fn date_arg(s: &str) -> AppResult<chrono::NaiveDate> {
    parse_date(s).ok_or_else(|| AppError::InvalidDate(s.to_string()))
}

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let Commands::Compute { date, to, device } = &cli.command else {
        return Ok(());
    };

    let from = date_arg(date)?;
    let to = match to {
        Some(t) => date_arg(t)?,
        None => from,
    };
    if to < from {
        return Err(AppError::InvalidDate(format!("{to} is before {from}")));
    }

    let mut pool = super::open_pool(cfg)?;
    let only = match device {
        Some(key) => Some(find_device(&pool.conn, key)?),
        None => None,
    };

    // One device, one day: show what was written.
    if let Some(d) = &only
        && from == to
    {
        let outcome = ProductionLogic::recompute(&mut pool, d, from, cfg)?;
        if cli.json {
            return super::print_json(&outcome);
        }
        match outcome {
            RecomputeOutcome::NoData => info(format!("No data for {} on {from}", d.name)),
            RecomputeOutcome::Written { record } => success(format!(
                "{} {}: daily {} ({}), week {}, month {}, year {}",
                d.name,
                record.date,
                record.daily,
                record.method.to_db_str(),
                record.totals.weekly,
                record.totals.monthly,
                record.totals.yearly
            )),
            RecomputeOutcome::Backfilled { records } => {
                warning(format!(
                    "{} {}: anomalous jump spread over {} day(s)",
                    d.name,
                    from,
                    records.len()
                ));
                for r in &records {
                    println!("   {}  {:>8}  {}", r.date, r.daily, r.source.to_db_str());
                }
            }
        }
        return Ok(());
    }

    let report = ProductionLogic::sweep(&mut pool, from, to, only.as_ref(), cfg)?;
    if cli.json {
        return super::print_json(&report);
    }
    success(format!(
        "{from}..{to}: {} device(s), {} updated, {} without data, {} error(s)",
        report.processed, report.updated, report.no_data, report.errors
    ));
    for (id, msg) in &report.failures {
        warning(format!("device {id}: {msg}"));
    }
    Ok(())
}
