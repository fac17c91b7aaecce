use crate::cli::parser::{Cli, Commands, PowerAction};
use crate::config::Config;
use crate::core::power::PowerMonitor;
use crate::db::devices::find_device;
use crate::db::power::{list_events, list_statuses};
use crate::errors::AppResult;
use crate::models::power::PowerEvent;
use crate::ui::messages::{header, info, success, warning};
use crate::utils::date::{fmt_ts, now};

fn print_events(events: &[PowerEvent]) {
    header("Power events");
    for e in events {
        println!(
            "{:>5}  {}  dev {:>3}  {:<24} {:<8} {} {}",
            e.id,
            fmt_ts(&e.occurred_at),
            e.device_id,
            e.kind.to_db_str(),
            e.severity.to_db_str(),
            if e.resolved { "✔" } else { " " },
            e.message
        );
    }
}

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let Commands::Power { action } = &cli.command else {
        return Ok(());
    };
    let mut pool = super::open_pool(cfg)?;

    match action {
        PowerAction::Sweep => {
            let sweep = PowerMonitor::sweep(&mut pool, cfg)?;
            if cli.json {
                return super::print_json(&sweep);
            }
            success(format!(
                "{} device(s), {} sample(s), {} transition(s), {} event(s)",
                sweep.report.processed, sweep.samples, sweep.transitions, sweep.events
            ));
            for (id, msg) in &sweep.report.failures {
                warning(format!("device {id}: {msg}"));
            }
        }
        PowerAction::Status => {
            let statuses = list_statuses(&pool.conn)?;
            if cli.json {
                return super::print_json(&statuses);
            }
            if statuses.is_empty() {
                info("No power status recorded yet.");
                return Ok(());
            }
            header("Power status");
            for s in &statuses {
                let since = if s.has_power {
                    s.power_restored_at
                } else {
                    s.power_loss_detected_at
                };
                println!(
                    "dev {:>3}  {:<4} value {:<10} checked {}  since {}",
                    s.device_id,
                    if s.has_power { "ON" } else { "OFF" },
                    s.last_value.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                    fmt_ts(&s.last_checked_at),
                    since.map(|t| fmt_ts(&t)).unwrap_or_else(|| "-".into())
                );
            }
        }
        PowerAction::Events { device, open } => {
            let device_id = match device {
                Some(key) => Some(find_device(&pool.conn, key)?.id),
                None => None,
            };
            let events = list_events(&pool.conn, device_id, *open)?;
            if cli.json {
                return super::print_json(&events);
            }
            if events.is_empty() {
                info("No power events.");
            } else {
                print_events(&events);
            }
        }
        PowerAction::Resolve { id } => {
            if PowerMonitor::resolve(&mut pool, *id, now())? {
                success(format!("Event {id} resolved."));
            } else {
                warning(format!("Event {id} not found or already resolved."));
            }
        }
    }
    Ok(())
}
