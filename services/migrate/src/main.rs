//! Observation migration driver.
//!
//! Dumps the legacy archive and the QC store to a CSV tree and imports that
//! tree into the observation database.

mod cli;
mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{CheckCommand, Cli, Command, DumpCommand, ImportCommand};
use config::MigrateConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let sink = logging::init(&cli.log_level)?;

    let config = MigrateConfig::from_env()?;
    info!(command = ?cli.command, "Starting migration");

    match cli.command {
        Command::Dump(DumpCommand::Arch(args)) => commands::dump::arch(args, &config, &sink).await,
        Command::Dump(DumpCommand::Qcdb(args)) => commands::dump::qcdb(args, &config, &sink).await,
        Command::Import(ImportCommand::Arch(args)) => {
            commands::import::arch(args, &config, &sink).await
        }
        Command::Import(ImportCommand::Qcdb(args)) => {
            commands::import::qcdb(args, &config, &sink).await
        }
        Command::List => {
            commands::list::run();
            Ok(())
        }
        Command::Check(CheckCommand::Overlap(args)) => commands::check::overlaps(args),
        Command::Check(CheckCommand::NonScalars(args)) => {
            commands::check::non_scalars(args, &config).await
        }
    }
}
