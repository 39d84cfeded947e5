// src/lib.rs

//! proposed-migration
//!
//! Orchestrates package migration from an archive's unstable pool into its
//! testing pool, using an external decision engine to choose what moves.
//!
//! # Architecture
//!
//! - Fetch: conditional download of `Sources`/`Packages` indexes into a persistent cache
//! - Assemble: regenerate the `testing` and `unstable` pools from the cache on every run
//! - Decide: render the engine configuration and run the engine against both pools
//! - Parse: classify the engine's delta result into promote/demote operations
//! - Execute: copy then remove through the archive, in order, dry-run or live
//!
//! Run parameters live in an immutable [`config::RunContext`]; the engine and
//! the archive are reached through the [`engine::DecisionEngine`] and
//! [`archive::ArchiveClient`] ports.

pub mod archive;
pub mod compression;
pub mod config;
pub mod delta;
pub mod engine;
mod error;
pub mod migration;
pub mod pipeline;
pub mod pool;
pub mod repository;

pub use config::{PoolName, RunConfig, RunContext};
pub use error::{Error, Result};
pub use migration::{ExecutionMode, ExecutionReport};
pub use pipeline::{Pipeline, RunSummary, Stage, StageError};
