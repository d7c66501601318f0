mod agenda;
mod calendar;
mod cli;
mod commands;
mod config;
mod focus;
mod logging;
mod model;
mod store;
mod ui;

use anyhow::Result;
use clap::Parser;
use tracing::info;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config_path = match args.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    let config = config::load_config(&config_path)?;
    let environment = config::Environment::from_env();
    let log_path = config::resolve_log_path(&config, &environment)?;
    logging::init(&log_path, &config.log_level)?;
    let db_path = config::resolve_database_path(args.db, &environment, &config)?;
    info!(db = %db_path.display(), config = %config_path.display(), "starting");

    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::Init => commands::init(&config_path),
        cli::Command::Week { offset } => commands::week(&db_path, offset),
        cli::Command::Day { date } => commands::day(&db_path, date),
        cli::Command::List { target, yaml } => commands::list(&db_path, target, yaml),
        cli::Command::Add { text, target } => commands::add(&db_path, text, target),
        cli::Command::Done { id } => commands::done(&db_path, id),
        cli::Command::Edit {
            id,
            text,
            target,
            unassign,
        } => commands::edit(&db_path, id, text, target, unassign),
        cli::Command::Delete { id } => commands::delete(&db_path, id),
        cli::Command::Tui => commands::tui(&db_path, config.start_view),
    }
}
