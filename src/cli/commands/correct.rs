use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::core::correction::CorrectionLogic;
use crate::db::devices::find_device;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{info, success, warning};

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let Commands::Correct {
        threshold,
        device,
        dry_run,
    } = &cli.command
    else {
        return Ok(());
    };
    if *threshold <= 1.0 {
        return Err(AppError::Config(format!(
            "threshold must be greater than 1.0, got {threshold}"
        )));
    }

    let mut pool = super::open_pool(cfg)?;
    let only = match device {
        Some(key) => Some(find_device(&pool.conn, key)?),
        None => None,
    };

    let report = CorrectionLogic::scan_and_correct(&mut pool, *threshold, only.as_ref(), *dry_run, cfg)?;
    if cli.json {
        return super::print_json(&report);
    }

    if *dry_run {
        info("Dry run: nothing was written.");
    }
    for item in &report.items {
        let avg = item
            .trailing_average
            .map(|a| format!("{a:.1}"))
            .unwrap_or_else(|| "-".into());
        if item.corrected {
            println!(
                "   dev {:>3} {}  {:>8} (avg {avg}) -> {} day(s) of ~{}",
                item.device_id, item.date, item.original, item.gap_days, item.per_day
            );
        } else {
            println!(
                "   dev {:>3} {}  {:>8} (avg {avg}) single-day spike, left as is",
                item.device_id, item.date, item.original
            );
        }
    }
    success(format!(
        "{} record(s) analyzed, {} flagged, {} corrected",
        report.analyzed, report.flagged, report.corrected
    ));
    if report.errors > 0 {
        warning(format!("{} device(s) failed, see log output", report.errors));
    }
    Ok(())
}
