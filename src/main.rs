// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the summaries
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("proposed-migration: {}", one_line(&format!("{e:#}")));
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run { config, dry_run } => commands::cmd_run(&config, dry_run),
        Commands::Fetch { config } => commands::cmd_fetch(&config),
        Commands::Assemble { config } => commands::cmd_assemble(&config),
        Commands::Parse { delta } => commands::cmd_parse(&delta),
        Commands::Apply {
            config,
            delta,
            dry_run,
        } => commands::cmd_apply(&config, &delta, dry_run),
    }
}

/// Fold a diagnostic onto a single line
fn one_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}
