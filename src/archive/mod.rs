// src/archive/mod.rs

//! Archive mutation port
//!
//! The archive performs the actual copies and removals; this crate only
//! decides which calls to issue. [`ArchiveClient`] is the seam: production
//! uses [`CommandArchiveClient`], tests use recording fakes.

mod command;

pub use command::CommandArchiveClient;

use crate::config::{PoolName, RunContext};
use crate::delta::MigrationOperation;
use crate::error::Result;
use std::fmt;

/// Everything one archive call carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveCall {
    pub package: String,
    pub version: String,
    pub source: PoolName,
    pub destination: PoolName,
    /// Archive suite backing the source pool
    pub from_suite: String,
    /// Archive suite backing the destination pool
    pub to_suite: String,
    pub comment: String,
    pub dry_run: bool,
}

impl ArchiveCall {
    /// Resolve an operation's pools to archive suites
    pub fn for_operation(ctx: &RunContext, op: &MigrationOperation, dry_run: bool) -> Self {
        Self {
            package: op.package.clone(),
            version: op.version.clone(),
            source: op.source,
            destination: op.destination,
            from_suite: ctx.pool(op.source).archive_suite.clone(),
            to_suite: ctx.pool(op.destination).archive_suite.clone(),
            comment: op.direction.comment().to_string(),
            dry_run,
        }
    }
}

impl fmt::Display for ArchiveCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} -> {})",
            self.package, self.version, self.from_suite, self.to_suite
        )?;
        if self.dry_run {
            write!(f, " [dry-run]")?;
        }
        Ok(())
    }
}

/// Successful result of an archive call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Applied,
    /// The archive reported the change was already in place
    AlreadyApplied,
}

/// Port to the archive's copy/remove primitives
///
/// Rejections other than "already applied" are [`crate::Error::ArchiveRejected`].
pub trait ArchiveClient {
    /// Copy `package`/`version` from `from_suite` into `to_suite`
    fn copy_package(&self, call: &ArchiveCall) -> Result<ArchiveOutcome>;

    /// Remove `package`/`version` from `from_suite`
    fn remove_package(&self, call: &ArchiveCall) -> Result<ArchiveOutcome>;
}
