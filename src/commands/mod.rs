// src/commands/mod.rs
//! Command handlers for the proposed-migration CLI

mod delta;
mod pipeline;

pub use delta::cmd_parse;
pub use pipeline::{cmd_apply, cmd_assemble, cmd_fetch, cmd_run};

use anyhow::{Context, Result};
use chrono::Utc;
use proposed_migration::config::{RunConfig, RunContext};
use std::path::Path;

/// Load and validate a run configuration, stamped with the current time
fn load_context(path: &Path) -> Result<RunContext> {
    let config = RunConfig::load(path).context("config")?;
    RunContext::new(config, Utc::now()).context("config")
}
