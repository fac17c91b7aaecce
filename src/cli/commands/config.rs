use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{success, warning};

/// Handle the `config` subcommand
pub fn handle(cli: &Cli, cfg: &Config) -> AppResult<()> {
    if let Commands::Config {
        print_config,
        check,
    } = &cli.command
    {
        if *print_config {
            if cli.json {
                super::print_json(cfg)?;
            } else {
                println!("📄 Current configuration:\n");
                println!("{}", serde_yaml::to_string(cfg)?);
            }
        }

        if *check {
            let problems = cfg.validate();
            if problems.is_empty() {
                success("Configuration is valid.");
            } else {
                for p in &problems {
                    warning(p);
                }
                return Err(AppError::Config(format!(
                    "{} invalid setting(s)",
                    problems.len()
                )));
            }
        }
    }
    Ok(())
}
