use crate::cli::parser::{Cli, Commands, DeviceAction};
use crate::config::Config;
use crate::core::device::{DeviceChanges, DeviceLogic};
use crate::db::devices::{find_device, list_devices};
use crate::errors::{AppError, AppResult};
use crate::models::device::{CalculationMode, Device};
use crate::ui::messages::{header, info, success};

fn parse_mode(s: &str) -> AppResult<CalculationMode> {
    CalculationMode::from_code(s).ok_or_else(|| AppError::InvalidMode(s.to_string()))
}

fn print_devices(devices: &[Device]) {
    header("Devices");
    println!(
        "{:>4}  {:<20} {:>7} {:>7}  {:<11} {:>9}",
        "ID", "NAME", "FACTORY", "COUNTER", "MODE", "THRESHOLD"
    );
    for d in devices {
        println!(
            "{:>4}  {:<20} {:>7} {:>7}  {:<11} {:>9}",
            d.id,
            d.name,
            d.factory_id,
            d.selected_counter,
            d.calculation_mode.to_db_str(),
            d.power_threshold
        );
    }
}

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let Commands::Device { action } = &cli.command else {
        return Ok(());
    };
    let mut pool = super::open_pool(cfg)?;

    match action {
        DeviceAction::Add {
            name,
            factory,
            counter,
            mode,
            threshold,
        } => {
            let device = DeviceLogic::add(&mut pool, name, *factory, *counter, parse_mode(mode)?, *threshold)?;
            if cli.json {
                super::print_json(&device)?;
            } else {
                success(format!("Device '{}' registered with id {}", device.name, device.id));
            }
        }
        DeviceAction::List => {
            let devices = list_devices(&pool.conn)?;
            if cli.json {
                super::print_json(&devices)?;
            } else if devices.is_empty() {
                info("No devices registered.");
            } else {
                print_devices(&devices);
            }
        }
        DeviceAction::Set {
            device,
            counter,
            mode,
            threshold,
        } => {
            let current = find_device(&pool.conn, device)?;
            let changes = DeviceChanges {
                selected_counter: *counter,
                calculation_mode: mode.as_deref().map(parse_mode).transpose()?,
                power_threshold: *threshold,
            };
            let updated = DeviceLogic::set(&mut pool, &current, &changes)?;
            if cli.json {
                super::print_json(&updated)?;
            } else {
                success(format!("Device '{}' updated", updated.name));
            }
        }
    }
    Ok(())
}
