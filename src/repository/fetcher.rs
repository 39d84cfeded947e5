// src/repository/fetcher.rs

//! Concurrent index fetching
//!
//! [`IndexFetcher::launch`] fires one task per descriptor on the rayon pool
//! and returns immediately; [`FetchBatch::join`] is the single blocking point
//! and returns once every launched fetch has either completed or failed.
//! Individual failures never abort sibling fetches.

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use tracing::{debug, info, warn};

use super::cache::{CacheEntry, IndexCache};
use super::client::{FetchResponse, IndexTransport};
use super::index::RemoteIndex;

/// How a single fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// New content was downloaded
    Fetched,
    /// Remote content was not newer than the cached marker
    Unchanged,
}

/// A fetch that failed; the run continues without it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub index: RemoteIndex,
    pub error: String,
}

/// Outcome of a joined fetch batch
#[derive(Debug, Default)]
pub struct FetchReport {
    pub fetched: Vec<CacheEntry>,
    pub unchanged: Vec<CacheEntry>,
    pub failed: Vec<FetchFailure>,
}

impl FetchReport {
    /// Number of documents actually downloaded
    pub fn downloads(&self) -> usize {
        self.fetched.len()
    }
}

impl fmt::Display for FetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Index fetch: {} downloaded, {} unchanged, {} failed",
            self.fetched.len(),
            self.unchanged.len(),
            self.failed.len()
        )?;
        for failure in &self.failed {
            writeln!(f, "  {} ({}): {}", failure.index, failure.index.url, failure.error)?;
        }
        Ok(())
    }
}

/// Launches conditional fetches into an [`IndexCache`]
pub struct IndexFetcher {
    cache: Arc<IndexCache>,
    transport: Arc<dyn IndexTransport>,
}

impl IndexFetcher {
    pub fn new(cache: IndexCache, transport: Arc<dyn IndexTransport>) -> Self {
        Self {
            cache: Arc::new(cache),
            transport,
        }
    }

    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    /// Start fetching every descriptor without waiting for completion
    ///
    /// At most one fetch is launched per URL.
    pub fn launch(&self, indexes: &[RemoteIndex]) -> FetchBatch {
        let (sender, receiver) = mpsc::channel();
        let mut seen = HashSet::new();
        let mut pending = 0;

        for index in indexes {
            if !seen.insert(index.url.clone()) {
                continue;
            }
            pending += 1;

            let sender = sender.clone();
            let cache = Arc::clone(&self.cache);
            let transport = Arc::clone(&self.transport);
            let index = index.clone();

            rayon::spawn(move || {
                let result = fetch_one(&cache, transport.as_ref(), &index);
                // The batch may have been dropped without joining
                let _ = sender.send((index, result));
            });
        }

        debug!("Launched {} index fetches", pending);
        FetchBatch { receiver, pending }
    }
}

/// Handle on a set of in-flight fetches
pub struct FetchBatch {
    receiver: Receiver<(RemoteIndex, Result<(FetchStatus, CacheEntry)>)>,
    pending: usize,
}

impl FetchBatch {
    /// Number of fetches launched in this batch
    pub fn len(&self) -> usize {
        self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }

    /// Block until every launched fetch has finished
    pub fn join(self) -> FetchReport {
        let mut report = FetchReport::default();

        for _ in 0..self.pending {
            let Ok((index, result)) = self.receiver.recv() else {
                warn!("Fetch worker exited without reporting");
                break;
            };

            match result {
                Ok((FetchStatus::Fetched, entry)) => {
                    debug!("Fetched {}", index);
                    report.fetched.push(entry);
                }
                Ok((FetchStatus::Unchanged, entry)) => {
                    debug!("{} unchanged", index);
                    report.unchanged.push(entry);
                }
                Err(e) => {
                    warn!("Failed to fetch {} ({}): {}", index, index.url, e);
                    report.failed.push(FetchFailure {
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Index fetch complete: {} downloaded, {} unchanged, {} failed",
            report.fetched.len(),
            report.unchanged.len(),
            report.failed.len()
        );
        report
    }
}

/// Conditionally fetch one index into the cache
pub fn fetch_one(
    cache: &IndexCache,
    transport: &dyn IndexTransport,
    index: &RemoteIndex,
) -> Result<(FetchStatus, CacheEntry)> {
    let existing = cache.lookup(index)?;
    let since = existing.as_ref().and_then(|entry| entry.last_modified);

    let (status, entry) = match transport.fetch(&index.url, since)? {
        FetchResponse::NotModified => {
            let entry = existing.ok_or_else(|| {
                Error::DownloadError(format!(
                    "{} reported not modified but nothing is cached",
                    index.url
                ))
            })?;
            (FetchStatus::Unchanged, entry)
        }
        FetchResponse::Fetched {
            body,
            last_modified,
        } => match (existing, last_modified) {
            // Never regress the marker when a mirror ignores If-Modified-Since
            (Some(entry), Some(remote)) if entry.last_modified.is_some_and(|m| remote <= m) => {
                (FetchStatus::Unchanged, entry)
            }
            _ => (
                FetchStatus::Fetched,
                cache.store(index, &body, last_modified)?,
            ),
        },
    };

    cache.touch_ancestors(&entry.path)?;
    Ok((status, entry))
}
