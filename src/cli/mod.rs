// src/cli/mod.rs
//! CLI definitions for proposed-migration
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! - `run` - Full pipeline: fetch, assemble, decide, apply
//! - `fetch` - Refresh the index cache only
//! - `assemble` - Refresh the cache and regenerate both pools
//! - `parse` - Show what a delta result would do
//! - `apply` - Apply an existing delta result to the archive

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "proposed-migration")]
#[command(version)]
#[command(about = "Migrate packages between unstable and testing using a decision engine", long_about = None)]
pub struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the whole migration pipeline
    Run {
        /// Path to the run configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Issue non-mutating archive calls only
        #[arg(long)]
        dry_run: bool,
    },

    /// Bring the index cache up to date
    Fetch {
        /// Path to the run configuration
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Fetch indexes and regenerate the testing and unstable pools
    Assemble {
        /// Path to the run configuration
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print the operations and manual entries in a delta result
    Parse {
        /// Delta result file (HeidiResultDelta)
        delta: PathBuf,
    },

    /// Apply an existing delta result to the archive
    Apply {
        /// Path to the run configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Delta result file (HeidiResultDelta)
        delta: PathBuf,

        /// Issue non-mutating archive calls only
        #[arg(long)]
        dry_run: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_dry_run() {
        let cli = Cli::parse_from(["proposed-migration", "-v", "run", "-c", "run.toml", "--dry-run"]);

        assert!(cli.verbose);
        match cli.command {
            Commands::Run { config, dry_run } => {
                assert_eq!(config, PathBuf::from("run.toml"));
                assert!(dry_run);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::parse_from([
            "proposed-migration",
            "apply",
            "--config",
            "run.toml",
            "HeidiResultDelta",
        ]);

        match cli.command {
            Commands::Apply {
                config,
                delta,
                dry_run,
            } => {
                assert_eq!(config, PathBuf::from("run.toml"));
                assert_eq!(delta, PathBuf::from("HeidiResultDelta"));
                assert!(!dry_run);
            }
            _ => panic!("expected apply"),
        }
    }
}
