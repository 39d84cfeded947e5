// src/repository/mod.rs

//! Remote index retrieval
//!
//! This module provides functionality for:
//! - Deriving the run's `Sources`/`Packages` descriptors from the run context
//! - Conditional (If-Modified-Since) fetching over HTTP or from local mirrors
//! - A persistent, marker-tracked index cache shared across runs
//! - Fire-and-join concurrent fetching with per-index failure isolation

mod cache;
mod client;
mod fetcher;
mod index;

pub use cache::{CacheEntry, IndexCache};
pub use client::{
    FetchResponse, IndexTransport, RepositoryClient, fetch_file, format_http_date,
    parse_http_date,
};
pub use fetcher::{FetchBatch, FetchFailure, FetchReport, FetchStatus, IndexFetcher, fetch_one};
pub use index::{IndexKind, RemoteIndex, declared_indexes, pool_indexes};
