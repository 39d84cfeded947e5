// src/pool/mod.rs

//! Decision engine pools
//!
//! A pool is an on-disk snapshot in the layout the decision engine reads:
//!
//! ```text
//! <data_dir>/<series>/<pool>/
//!     Sources            concatenated source indexes
//!     Packages_<arch>    concatenated binary indexes, one per architecture
//!     Hints -> <hints_dir>
//!     Blocks             operator holds, never overwritten
//!     Dates              age tracking, never overwritten
//! ```
//!
//! Index files are regenerated from the cache on every run; the control
//! files carry operator state across runs.

mod assembler;

pub use assembler::PoolAssembler;

use crate::config::{PoolName, RunContext};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const SOURCES_FILE: &str = "Sources";
pub const HINTS_LINK: &str = "Hints";
pub const BLOCKS_FILE: &str = "Blocks";
pub const DATES_FILE: &str = "Dates";

/// Prefix of per-architecture binary index files
pub const PACKAGES_PREFIX: &str = "Packages_";

/// Name of the merged binary index for `architecture`
pub fn packages_file_name(architecture: &str) -> String {
    format!("{PACKAGES_PREFIX}{architecture}")
}

/// Paths making up one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub name: PoolName,
    pub root: PathBuf,
    pub sources: PathBuf,
    /// Architecture -> merged binary index
    pub packages: BTreeMap<String, PathBuf>,
    pub hints: PathBuf,
    pub blocks: PathBuf,
    pub dates: PathBuf,
}

impl Pool {
    /// Expected layout of pool `name` for this run
    pub fn layout(ctx: &RunContext, name: PoolName) -> Self {
        let root = ctx.pool_dir(name);
        let packages = ctx
            .architectures
            .iter()
            .map(|arch| (arch.clone(), root.join(packages_file_name(arch))))
            .collect();

        Self {
            name,
            sources: root.join(SOURCES_FILE),
            packages,
            hints: root.join(HINTS_LINK),
            blocks: root.join(BLOCKS_FILE),
            dates: root.join(DATES_FILE),
            root,
        }
    }

    /// Check that every required index file exists
    ///
    /// A missing `Sources` is reported with architecture `source`.
    pub fn verify(&self) -> Result<()> {
        if !self.sources.is_file() {
            return Err(Error::PoolIncomplete {
                pool: self.name.to_string(),
                architecture: "source".to_string(),
            });
        }
        for (arch, path) in &self.packages {
            if !path.is_file() {
                return Err(Error::PoolIncomplete {
                    pool: self.name.to_string(),
                    architecture: arch.clone(),
                });
            }
        }
        Ok(())
    }
}
