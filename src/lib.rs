//! milltrack library root.
//! Counter telemetry engine for milling machines: power state monitoring,
//! daily production (legacy and reset-aware), batch progress and historical
//! correction, on top of a local SQLite store.

pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod errors;
pub mod models;
pub mod ui;
pub mod utils;

use clap::Parser;
use cli::parser::{Cli, Commands};
use config::Config;
use errors::AppResult;
use tracing_subscriber::EnvFilter;

/// Central command dispatcher
pub fn dispatch(cli: &Cli, cfg: &Config) -> AppResult<()> {
    match &cli.command {
        Commands::Init => cli::commands::init::handle(cli, cfg),
        Commands::Config { .. } => cli::commands::config::handle(cli, cfg),
        Commands::Db { .. } => cli::commands::db::handle(cli, cfg),
        Commands::Log { .. } => cli::commands::log::handle(cli, cfg),
        Commands::Device { .. } => cli::commands::device::handle(cli, cfg),
        Commands::Ingest { .. } => cli::commands::ingest::handle(cli, cfg),
        Commands::Power { .. } => cli::commands::power::handle(cli, cfg),
        Commands::Compute { .. } => cli::commands::compute::handle(cli, cfg),
        Commands::List { .. } => cli::commands::list::handle(cli, cfg),
        Commands::Reset { .. } => cli::commands::reset::handle(cli, cfg),
        Commands::Batch { .. } => cli::commands::batch::handle(cli, cfg),
        Commands::Correct { .. } => cli::commands::correct::handle(cli, cfg),
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Entry point used by main.rs
pub fn run() -> AppResult<()> {
    let cli = Cli::parse();

    // Loaded once; everything downstream receives it explicitly.
    let mut cfg = Config::load()?;
    if let Some(custom_db) = &cli.db {
        cfg.database = custom_db.clone();
    }

    init_tracing(&cfg.log_level);
    dispatch(&cli, &cfg)
}
