// src/commands/pipeline.rs
//! Pipeline commands: run, fetch, assemble, apply

use anyhow::{Context, Result};
use proposed_migration::archive::CommandArchiveClient;
use proposed_migration::config::RunContext;
use proposed_migration::engine::ProcessEngine;
use proposed_migration::migration::ExecutionMode;
use proposed_migration::pipeline::Pipeline;
use proposed_migration::repository::RepositoryClient;
use std::path::Path;
use std::sync::Arc;

use super::load_context;

/// Production collaborators for a run
struct Collaborators {
    transport: Arc<RepositoryClient>,
    engine: ProcessEngine,
    archive: CommandArchiveClient,
}

impl Collaborators {
    fn for_context(ctx: &RunContext) -> Result<Self> {
        Ok(Self {
            transport: Arc::new(RepositoryClient::new().context("fetch")?),
            engine: ProcessEngine::from_config(&ctx.engine),
            archive: CommandArchiveClient::from_config(&ctx.archive).context("config")?,
        })
    }

    fn pipeline<'a>(&'a self, ctx: &'a RunContext, dry_run: bool) -> Pipeline<'a> {
        Pipeline::new(
            ctx,
            self.transport.clone(),
            &self.engine,
            &self.archive,
            ExecutionMode::from_dry_run(dry_run),
        )
    }
}

/// Run the full migration pipeline
pub fn cmd_run(config: &Path, dry_run: bool) -> Result<()> {
    let ctx = load_context(config)?;
    let collaborators = Collaborators::for_context(&ctx)?;

    let summary = collaborators.pipeline(&ctx, dry_run).run()?;
    print!("{}", summary);
    Ok(())
}

/// Bring the index cache up to date
pub fn cmd_fetch(config: &Path) -> Result<()> {
    let ctx = load_context(config)?;
    let collaborators = Collaborators::for_context(&ctx)?;

    let report = collaborators.pipeline(&ctx, true).fetch()?;
    print!("{}", report);
    Ok(())
}

/// Fetch indexes and regenerate both pools
pub fn cmd_assemble(config: &Path) -> Result<()> {
    let ctx = load_context(config)?;
    let collaborators = Collaborators::for_context(&ctx)?;
    let pipeline = collaborators.pipeline(&ctx, true);

    let report = pipeline.fetch()?;
    print!("{}", report);

    for pool in pipeline.assemble()? {
        println!(
            "Pool {}: {} ({} architectures)",
            pool.name,
            pool.root.display(),
            pool.packages.len()
        );
    }
    Ok(())
}

/// Apply an existing delta result to the archive
pub fn cmd_apply(config: &Path, delta: &Path, dry_run: bool) -> Result<()> {
    let ctx = load_context(config)?;
    let collaborators = Collaborators::for_context(&ctx)?;

    let report = collaborators.pipeline(&ctx, dry_run).execute(delta)?;
    print!("{}", report);
    Ok(())
}
