//! notesync CLI - Inspect and drive note documents from the terminal
//!
//! Every command works on the same local database the widgets use, through
//! the same store, history, and sync coordinator.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::Context;
use crate::commands::history::{run_discard, run_history, run_purge};
use crate::commands::mode::run_mode;
use crate::commands::pull::run_pull;
use crate::commands::restore::run_restore;
use crate::commands::save::run_save;
use crate::commands::show::run_show;
use crate::commands::write::run_write;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("notesync=info".parse().expect("Invalid log directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = Context::from_env(cli.db_path, cli.settings.as_deref())?;

    match cli.command {
        Commands::Show { id } => run_show(&id, &context).await?,
        Commands::Write { id, content } => run_write(&id, &content, &context).await?,
        Commands::Mode { id, mode } => run_mode(&id, mode, &context).await?,
        Commands::Save { id, force } => run_save(&id, force, &context).await?,
        Commands::History { id, json } => run_history(&id, json, &context).await?,
        Commands::Restore { id, snapshot } => run_restore(&id, &snapshot, &context).await?,
        Commands::Discard { id, snapshot } => run_discard(&id, &snapshot, &context).await?,
        Commands::Purge { id } => run_purge(&id, &context).await?,
        Commands::Pull { id } => run_pull(&id, &context).await?,
    }

    Ok(())
}
