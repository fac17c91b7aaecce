use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::core::ingest::{IngestLogic, parse_jsonl};
use crate::errors::AppResult;
use crate::ui::messages::{success, warning};
use std::fs;

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let Commands::Ingest { file, no_power } = &cli.command else {
        return Ok(());
    };

    let text = fs::read_to_string(file)?;
    let (inputs, bad_lines) = parse_jsonl(&text);
    for e in &bad_lines {
        tracing::warn!(error = %e, "line skipped");
    }

    let mut pool = super::open_pool(cfg)?;
    let mut report = IngestLogic::ingest(&mut pool, &inputs, cfg, !no_power)?;
    report.received += bad_lines.len();
    report.invalid += bad_lines.len();

    if cli.json {
        return super::print_json(&report);
    }

    success(format!(
        "{} received, {} stored, {} duplicate(s), {} invalid",
        report.received, report.inserted, report.duplicates, report.invalid
    ));
    if !no_power {
        println!(
            "⚡ {} power transition(s), {} event(s)",
            report.transitions, report.events
        );
    }
    if report.errors > 0 {
        warning(format!("{} device(s) failed, see log output", report.errors));
    }
    Ok(())
}
