use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::core::device::DeviceLogic;
use crate::db::devices::find_device;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::success;
use crate::utils::date::parse_timestamp;

pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    let Commands::Reset {
        device,
        at,
        before,
        reason,
        failed,
    } = &cli.command
    else {
        return Ok(());
    };

    let at = parse_timestamp(at).ok_or_else(|| AppError::InvalidDate(at.clone()))?;
    let mut pool = super::open_pool(cfg)?;
    let dev = find_device(&pool.conn, device)?;

    let id = DeviceLogic::record_reset(&mut pool, &dev, at, *before, reason, !failed)?;
    success(format!(
        "Reset #{id} recorded for {} at {at} ({})",
        dev.name,
        if *failed { "failed" } else { "succeeded" }
    ));
    Ok(())
}
