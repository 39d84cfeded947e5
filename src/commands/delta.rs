// src/commands/delta.rs
//! Delta inspection commands

use anyhow::{Context, Result};
use proposed_migration::delta::{DeltaReader, DeltaRecord, MigrationOperation};
use std::path::Path;
use tracing::info;

/// Print what a delta result would do, without touching the archive
pub fn cmd_parse(delta: &Path) -> Result<()> {
    info!("Parsing {}", delta.display());
    let reader = DeltaReader::open(delta).context("parse")?;

    let mut operations = 0;
    let mut manual = 0;
    for record in reader {
        match record.context("parse")? {
            DeltaRecord::Source(entry) => {
                operations += 1;
                println!("{}", MigrationOperation::from(&entry));
            }
            DeltaRecord::SkipManual(entry) => {
                manual += 1;
                println!("manual: {}", entry);
            }
        }
    }

    println!("{} operations, {} for manual review", operations, manual);
    Ok(())
}
