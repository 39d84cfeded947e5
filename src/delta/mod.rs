// src/delta/mod.rs

//! Decision engine delta results
//!
//! The engine writes one line per migration decision:
//!
//! ```text
//! # commentary
//! libfoo 1.2.3            promote source libfoo to testing
//! -libbar 2.0-1           demote source libbar back to unstable
//! libbaz 1.0 amd64        binary-only change, needs manual handling
//! ```
//!
//! [`DeltaReader`] turns that into typed records; [`MigrationOperation`]
//! fixes which pool each source entry moves from and to.

mod parser;

pub use parser::{DeltaReader, LineClass, classify_line, parse_str};

use crate::config::PoolName;
use std::fmt;

/// Prefix marking a source entry for reversal
pub const REMOVAL_MARKER: char = '-';

/// Which way a source package moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// unstable -> testing
    Promote,
    /// testing -> unstable
    Demote,
}

impl Direction {
    pub fn source(&self) -> PoolName {
        match self {
            Self::Promote => PoolName::Unstable,
            Self::Demote => PoolName::Testing,
        }
    }

    pub fn destination(&self) -> PoolName {
        match self {
            Self::Promote => PoolName::Testing,
            Self::Demote => PoolName::Unstable,
        }
    }

    /// Operator comment attached to archive calls
    pub fn comment(&self) -> &'static str {
        match self {
            Self::Promote => "moved to release",
            Self::Demote => "demoted to proposed",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Promote => write!(f, "promote"),
            Self::Demote => write!(f, "demote"),
        }
    }
}

/// A source-level decision from the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaEntry {
    /// Package name with any removal marker stripped
    pub package: String,
    pub version: String,
    pub direction: Direction,
}

/// Why a line was routed to manual review
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualReason {
    /// Not a two-field source entry
    BinaryOnly { fields: usize },
    /// Two fields, but the name is not a valid package name
    InvalidName,
    /// Two fields, but the version is not a valid Debian version
    InvalidVersion,
    /// Line is not valid UTF-8
    InvalidEncoding,
}

impl fmt::Display for ManualReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BinaryOnly { fields } => write!(f, "binary-only change ({fields} fields)"),
            Self::InvalidName => write!(f, "invalid package name"),
            Self::InvalidVersion => write!(f, "invalid version"),
            Self::InvalidEncoding => write!(f, "invalid UTF-8"),
        }
    }
}

/// A delta line needing operator attention instead of automatic action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualEntry {
    /// 1-based line number in the result artifact
    pub line: usize,
    pub raw: String,
    pub reason: ManualReason,
}

impl fmt::Display for ManualEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} [{}]", self.line, self.raw, self.reason)
    }
}

/// One meaningful line of a delta result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaRecord {
    Source(DeltaEntry),
    SkipManual(ManualEntry),
}

/// A source entry resolved to pools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOperation {
    pub package: String,
    pub version: String,
    pub direction: Direction,
    pub source: PoolName,
    pub destination: PoolName,
}

impl From<&DeltaEntry> for MigrationOperation {
    fn from(entry: &DeltaEntry) -> Self {
        Self {
            package: entry.package.clone(),
            version: entry.version.clone(),
            direction: entry.direction,
            source: entry.direction.source(),
            destination: entry.direction.destination(),
        }
    }
}

impl fmt::Display for MigrationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({} -> {})",
            self.direction, self.package, self.version, self.source, self.destination
        )
    }
}
