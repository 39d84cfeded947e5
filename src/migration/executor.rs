// src/migration/executor.rs

//! Sequential executor for delta records
//!
//! Each source entry becomes a copy into the destination suite followed by
//! a removal from the source suite. The removal is only issued once the copy
//! has been acknowledged, so an interrupted run never leaves a package in
//! neither pool. Entries are independent: a rejected entry is recorded and
//! the next one proceeds.

use crate::archive::{ArchiveCall, ArchiveClient, ArchiveOutcome};
use crate::config::RunContext;
use crate::delta::{DeltaRecord, MigrationOperation};
use crate::error::Result;
use tracing::{info, warn};

use super::{ExecutionFailure, ExecutionMode, ExecutionReport, ExecutionStep};

pub struct MigrationExecutor<'a> {
    ctx: &'a RunContext,
    archive: &'a dyn ArchiveClient,
    mode: ExecutionMode,
}

impl<'a> MigrationExecutor<'a> {
    pub fn new(ctx: &'a RunContext, archive: &'a dyn ArchiveClient, mode: ExecutionMode) -> Self {
        Self { ctx, archive, mode }
    }

    /// Execute records in order
    ///
    /// Only a failure to read the records themselves is returned as an
    /// error; archive rejections land in the report.
    pub fn execute<I>(&self, records: I) -> Result<ExecutionReport>
    where
        I: IntoIterator<Item = Result<DeltaRecord>>,
    {
        let mut report = ExecutionReport::new(self.mode);

        for record in records {
            match record? {
                DeltaRecord::Source(entry) => {
                    let operation = MigrationOperation::from(&entry);
                    self.apply(operation, &mut report);
                }
                DeltaRecord::SkipManual(manual) => {
                    warn!("Skipping for manual review: {}", manual);
                    report.manual.push(manual);
                }
            }
        }

        info!(
            "Executed {} operations ({}): {} applied, {} already applied, {} failed",
            report.operations(),
            self.mode,
            report.applied.len(),
            report.already_applied.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn apply(&self, operation: MigrationOperation, report: &mut ExecutionReport) {
        let call = ArchiveCall::for_operation(self.ctx, &operation, self.mode.is_dry_run());
        info!("{} {}", operation.direction, call);

        let copied = match self.archive.copy_package(&call) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Copy of {} failed: {}", call, e);
                report.failures.push(ExecutionFailure {
                    operation,
                    step: ExecutionStep::Copy,
                    error: e.to_string(),
                });
                return;
            }
        };

        let removed = match self.archive.remove_package(&call) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Removal of {} failed: {}", call, e);
                report.failures.push(ExecutionFailure {
                    operation,
                    step: ExecutionStep::Remove,
                    error: e.to_string(),
                });
                return;
            }
        };

        if copied == ArchiveOutcome::AlreadyApplied && removed == ArchiveOutcome::AlreadyApplied {
            report.already_applied.push(operation);
        } else {
            report.applied.push(operation);
        }
    }
}
