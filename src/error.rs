// src/error.rs

//! Crate-wide error type
//!
//! Variants follow the pipeline's failure taxonomy: transient fetch failures
//! are reported and skipped, while pool, configuration and engine failures
//! abort the run before any archive mutation is issued.

use thiserror::Error;

/// Errors produced by the migration pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed run configuration or index URL
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A single index could not be retrieved
    #[error("Download error: {0}")]
    DownloadError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    /// A pool is missing a required index after assembly
    #[error("Pool '{pool}' is incomplete: no index for architecture '{architecture}'")]
    PoolIncomplete { pool: String, architecture: String },

    /// Engine configuration could not be rendered
    #[error("Config generation failed: {0}")]
    ConfigGeneration(String),

    /// Decision engine exited non-zero or produced no result
    #[error("Decision engine failed: {0}")]
    EngineFailure(String),

    /// Archive call rejected for a reason other than "already applied"
    #[error("Archive rejected call: {0}")]
    ArchiveRejected(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
