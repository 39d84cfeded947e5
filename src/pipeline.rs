// src/pipeline.rs

//! End-to-end migration run
//!
//! A single control thread drives the stages in order:
//!
//! ```text
//! fetch -> assemble -> configure -> decide -> parse -> execute
//! ```
//!
//! Only the fetch stage runs work concurrently. A fatal error at any stage
//! stops the run and is tagged with the stage it came from; on-disk results
//! of earlier stages are left in place for inspection.

use crate::archive::ArchiveClient;
use crate::config::RunContext;
use crate::delta::DeltaReader;
use crate::engine::{ConfigTemplate, DecisionEngine, EngineAdapter, RunArtifacts};
use crate::error::Error;
use crate::migration::{ExecutionMode, ExecutionReport, MigrationExecutor};
use crate::pool::{Pool, PoolAssembler};
use crate::repository::{FetchReport, IndexCache, IndexFetcher, IndexTransport, declared_indexes};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Pipeline stage names used in fatal diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Assemble,
    Configure,
    Decide,
    Parse,
    Execute,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Assemble => "assemble",
            Self::Configure => "configure",
            Self::Decide => "decide",
            Self::Parse => "parse",
            Self::Execute => "execute",
        };
        f.write_str(name)
    }
}

/// A fatal error and the stage that raised it
///
/// Displays as the stage name; the cause is the error source, so an
/// alternate-formatted chain reads `<stage>: <cause>`.
#[derive(Debug, thiserror::Error)]
#[error("{stage}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

pub type StageResult<T> = std::result::Result<T, StageError>;

trait InStage<T> {
    fn in_stage(self, stage: Stage) -> StageResult<T>;
}

impl<T> InStage<T> for crate::error::Result<T> {
    fn in_stage(self, stage: Stage) -> StageResult<T> {
        self.map_err(|source| StageError { stage, source })
    }
}

/// What a complete run produced
#[derive(Debug)]
pub struct RunSummary {
    pub fetch: FetchReport,
    pub artifacts: RunArtifacts,
    pub execution: ExecutionReport,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run output: {}", self.artifacts.dir.display())?;
        write!(f, "{}", self.fetch)?;
        write!(f, "{}", self.execution)
    }
}

/// One configured run with its collaborators
pub struct Pipeline<'a> {
    ctx: &'a RunContext,
    transport: Arc<dyn IndexTransport>,
    engine: &'a dyn DecisionEngine,
    archive: &'a dyn ArchiveClient,
    mode: ExecutionMode,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        ctx: &'a RunContext,
        transport: Arc<dyn IndexTransport>,
        engine: &'a dyn DecisionEngine,
        archive: &'a dyn ArchiveClient,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            ctx,
            transport,
            engine,
            archive,
            mode,
        }
    }

    fn cache(&self) -> IndexCache {
        IndexCache::new(&self.ctx.paths.cache_dir)
    }

    /// Bring the index cache up to date
    ///
    /// Descriptor errors are fatal before any fetch starts; individual
    /// fetch failures are only reported.
    pub fn fetch(&self) -> StageResult<FetchReport> {
        let indexes = declared_indexes(self.ctx).in_stage(Stage::Fetch)?;
        info!("Fetching {} indexes for {}", indexes.len(), self.ctx.series);

        let fetcher = IndexFetcher::new(self.cache(), Arc::clone(&self.transport));
        Ok(fetcher.launch(&indexes).join())
    }

    /// Regenerate both pools from the cache
    pub fn assemble(&self) -> StageResult<Vec<Pool>> {
        let cache = self.cache();
        PoolAssembler::new(self.ctx, &cache)
            .assemble_all()
            .in_stage(Stage::Assemble)
    }

    /// Render the engine configuration for this run
    pub fn configure(&self, pools: &[Pool]) -> StageResult<RunArtifacts> {
        let template = ConfigTemplate::for_context(self.ctx).in_stage(Stage::Configure)?;
        EngineAdapter::new(self.ctx, self.engine)
            .generate_config(pools, &template)
            .in_stage(Stage::Configure)
    }

    /// Run the decision engine and locate its delta
    pub fn decide(&self, pools: &[Pool], artifacts: &RunArtifacts) -> StageResult<PathBuf> {
        EngineAdapter::new(self.ctx, self.engine)
            .decide(pools, artifacts)
            .in_stage(Stage::Decide)
    }

    /// Parse a delta result and apply it to the archive
    pub fn execute(&self, delta: &Path) -> StageResult<ExecutionReport> {
        let reader = DeltaReader::open(delta).in_stage(Stage::Parse)?;
        info!("Applying {} ({})", delta.display(), self.mode);

        MigrationExecutor::new(self.ctx, self.archive, self.mode)
            .execute(reader)
            .in_stage(Stage::Execute)
    }

    /// Run every stage in order
    pub fn run(&self) -> StageResult<RunSummary> {
        info!(
            "Starting migration run {} for {} ({})",
            self.ctx.run_tag(),
            self.ctx.series,
            self.mode
        );

        let fetch = self.fetch()?;
        let pools = self.assemble()?;
        let artifacts = self.configure(&pools)?;
        let delta = self.decide(&pools, &artifacts)?;
        let execution = self.execute(&delta)?;

        if execution.has_failures() {
            info!(
                "Run finished with {} rejected operations",
                execution.failures.len()
            );
        }

        Ok(RunSummary {
            fetch,
            artifacts,
            execution,
        })
    }
}
