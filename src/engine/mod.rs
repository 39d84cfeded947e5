// src/engine/mod.rs

//! Decision engine adapter
//!
//! The engine itself is an external program. This module owns everything
//! around it: rendering its configuration, checking the pools it will read,
//! invoking it through the [`DecisionEngine`] port, and locating the delta
//! result it leaves in the run-scoped output directory.

mod process;
mod template;

pub use process::ProcessEngine;
pub use template::{ConfigTemplate, bindings};

use crate::config::{PoolName, RunContext};
use crate::error::{Error, Result};
use crate::pool::Pool;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_FILE: &str = "britney.conf";
pub const HEIDI_FILE: &str = "HeidiResult";
pub const DELTA_FILE: &str = "HeidiResultDelta";
pub const LOG_FILE: &str = "britney.log";

/// Port to the external migration decision engine
pub trait DecisionEngine {
    /// Run the engine with `config` for `series`, blocking until it exits
    ///
    /// Engine output goes to `log`. Any non-successful termination is an
    /// [`Error::EngineFailure`].
    fn run(&self, config: &Path, series: &str, log: &Path) -> Result<()>;
}

/// Run-scoped engine input and output locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifacts {
    pub dir: PathBuf,
    pub config: PathBuf,
    pub heidi: PathBuf,
    pub delta: PathBuf,
    pub log: PathBuf,
}

impl RunArtifacts {
    pub fn for_context(ctx: &RunContext) -> Self {
        let dir = ctx.run_dir();
        Self {
            config: dir.join(CONFIG_FILE),
            heidi: dir.join(HEIDI_FILE),
            delta: dir.join(DELTA_FILE),
            log: dir.join(LOG_FILE),
            dir,
        }
    }
}

/// Drives one engine invocation for a run
pub struct EngineAdapter<'a> {
    ctx: &'a RunContext,
    engine: &'a dyn DecisionEngine,
}

impl<'a> EngineAdapter<'a> {
    pub fn new(ctx: &'a RunContext, engine: &'a dyn DecisionEngine) -> Self {
        Self { ctx, engine }
    }

    /// Render the engine configuration into the run directory
    pub fn generate_config(&self, pools: &[Pool], template: &ConfigTemplate) -> Result<RunArtifacts> {
        let artifacts = RunArtifacts::for_context(self.ctx);
        let testing = find_pool(pools, PoolName::Testing)?;
        let unstable = find_pool(pools, PoolName::Unstable)?;

        let rendered = template.render(&bindings(self.ctx, testing, unstable, &artifacts))?;

        fs::create_dir_all(&artifacts.dir).map_err(|e| {
            Error::IoError(format!("Failed to create directory {}: {e}", artifacts.dir.display()))
        })?;
        fs::write(&artifacts.config, rendered).map_err(|e| {
            Error::IoError(format!("Failed to write {}: {e}", artifacts.config.display()))
        })?;

        info!("Wrote engine configuration to {}", artifacts.config.display());
        Ok(artifacts)
    }

    /// Invoke the engine and return the path of its delta result
    ///
    /// Both pools are re-verified first; the engine silently mis-scores
    /// packages on a missing architecture.
    pub fn decide(&self, pools: &[Pool], artifacts: &RunArtifacts) -> Result<PathBuf> {
        for name in PoolName::ALL {
            find_pool(pools, name)?.verify()?;
        }

        info!("Running decision engine for {}", self.ctx.series);
        self.engine
            .run(&artifacts.config, &self.ctx.series, &artifacts.log)?;

        if !artifacts.delta.is_file() {
            return Err(Error::EngineFailure(format!(
                "engine exited successfully but produced no result at {}",
                artifacts.delta.display()
            )));
        }

        info!("Decision engine result at {}", artifacts.delta.display());
        Ok(artifacts.delta.clone())
    }
}

fn find_pool(pools: &[Pool], name: PoolName) -> Result<&Pool> {
    pools.iter().find(|pool| pool.name == name).ok_or_else(|| {
        Error::PoolIncomplete {
            pool: name.to_string(),
            architecture: "source".to_string(),
        }
    })
}
