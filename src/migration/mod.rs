// src/migration/mod.rs

//! Migration execution
//!
//! Turns parsed delta records into archive calls and collects what happened
//! into an [`ExecutionReport`] for the end-of-run summary.

mod executor;

pub use executor::MigrationExecutor;

use crate::delta::{ManualEntry, MigrationOperation};
use std::fmt;

/// Whether archive calls mutate anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    DryRun,
    Live,
}

impl ExecutionMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::DryRun } else { Self::Live }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DryRun => write!(f, "dry-run"),
            Self::Live => write!(f, "live"),
        }
    }
}

/// Which half of an operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStep {
    Copy,
    Remove,
}

impl fmt::Display for ExecutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => write!(f, "copy"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// An operation the archive rejected
#[derive(Debug, Clone)]
pub struct ExecutionFailure {
    pub operation: MigrationOperation,
    pub step: ExecutionStep,
    pub error: String,
}

/// Outcome of executing one delta result
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub mode: ExecutionMode,
    /// Operations where at least one call changed the archive
    pub applied: Vec<MigrationOperation>,
    /// Operations the archive reported as already done
    pub already_applied: Vec<MigrationOperation>,
    pub failures: Vec<ExecutionFailure>,
    pub manual: Vec<ManualEntry>,
}

impl ExecutionReport {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            applied: Vec::new(),
            already_applied: Vec::new(),
            failures: Vec::new(),
            manual: Vec::new(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Source operations seen, whatever their outcome
    pub fn operations(&self) -> usize {
        self.applied.len() + self.already_applied.len() + self.failures.len()
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Migration summary ({}):", self.mode)?;
        writeln!(f, "  applied:         {}", self.applied.len())?;
        writeln!(f, "  already applied: {}", self.already_applied.len())?;
        writeln!(f, "  failed:          {}", self.failures.len())?;
        writeln!(f, "  manual review:   {}", self.manual.len())?;

        if !self.failures.is_empty() {
            writeln!(f, "Failures:")?;
            for failure in &self.failures {
                writeln!(f, "  {}: {}: {}", failure.operation, failure.step, failure.error)?;
            }
        }
        if !self.manual.is_empty() {
            writeln!(f, "Manual review:")?;
            for entry in &self.manual {
                writeln!(f, "  {entry}")?;
            }
        }
        Ok(())
    }
}
