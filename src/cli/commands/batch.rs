use crate::cli::parser::{BatchAction, Cli, Commands};
use crate::config::Config;
use crate::core::batch::{BatchLogic, BatchProgress};
use crate::db::batches::list_batches;
use crate::errors::{AppError, AppResult};
use crate::models::batch::BatchStatus;
use crate::ui::messages::{header, info, success, warning};
use crate::utils::date::{fmt_ts, parse_timestamp};

fn print_progress(p: &BatchProgress) {
    println!(
        "Batch {}: {} units, {:.3} t, {:.1}% [{}] (source: {})",
        p.batch_id,
        p.current_delta,
        p.actual_output,
        p.progress_percent,
        p.status.to_db_str(),
        p.data_source.to_db_str()
    );
    for d in &p.devices {
        println!(
            "   {:<20} {:>10} -> {:>10}  +{:<8} {}",
            d.name,
            d.start_value,
            d.current_value,
            d.delta,
            d.source.to_db_str()
        );
    }
    if p.completed_now {
        success(format!("Batch {} completed.", p.batch_id));
    }
}

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let Commands::Batch { action } = &cli.command else {
        return Ok(());
    };
    let mut pool = super::open_pool(cfg)?;

    match action {
        BatchAction::Add {
            name,
            factory,
            start,
            expected,
            start_value,
            waste,
        } => {
            let start = parse_timestamp(start).ok_or_else(|| AppError::InvalidDate(start.clone()))?;
            let id = BatchLogic::create(
                &mut pool,
                name,
                *factory,
                start,
                *start_value,
                *expected,
                waste.unwrap_or(cfg.default_waste_factor),
            )?;
            success(format!("Batch '{name}' created with id {id}"));
        }
        BatchAction::List => {
            let batches = list_batches(&pool.conn)?;
            if cli.json {
                return super::print_json(&batches);
            }
            if batches.is_empty() {
                info("No batches.");
                return Ok(());
            }
            header("Batches");
            for b in &batches {
                println!(
                    "{:>4}  {:<20} factory {:>3}  {}  {:>9.3}/{:<9.3} t  {:<10} {}",
                    b.id,
                    b.name,
                    b.factory_id,
                    fmt_ts(&b.start_date),
                    b.actual_output,
                    b.expected_output,
                    b.status.to_db_str(),
                    b.completed_at.map(|t| fmt_ts(&t)).unwrap_or_default()
                );
            }
        }
        BatchAction::Progress { id } => {
            let progress = BatchLogic::recompute(&mut pool, *id, cfg)?;
            if cli.json {
                return super::print_json(&progress);
            }
            print_progress(&progress);
        }
        BatchAction::Sweep => {
            let sweep = BatchLogic::sweep(&mut pool, cfg)?;
            if cli.json {
                return super::print_json(&sweep);
            }
            for p in &sweep.results {
                print_progress(p);
            }
            success(format!(
                "{} batch(es) recomputed, {} completed",
                sweep.processed, sweep.completed
            ));
            if sweep.errors > 0 {
                warning(format!("{} batch(es) failed, see log output", sweep.errors));
            }
        }
        BatchAction::Status { id, status } => {
            let s = BatchStatus::from_db_str(&status.to_lowercase().replace('-', "_"))
                .ok_or_else(|| AppError::InvalidStatus(status.clone()))?;
            BatchLogic::set_status(&mut pool, *id, s)?;
            success(format!("Batch {id} is now {}", s.to_db_str()));
        }
    }
    Ok(())
}
