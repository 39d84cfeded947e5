// src/repository/cache.rs

//! Local index cache
//!
//! Each cached index is a body file plus a JSON marker sidecar recording the
//! remote's modification marker. The marker, not file timestamps, decides
//! whether a refetch is needed. The cache is append/update-only and shared
//! across runs; entries live at `<root>/<pocket>/<path-derived-subdir>/<file>`.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::index::RemoteIndex;

/// Suffix of the marker sidecar next to each cached body
const MARKER_SUFFIX: &str = ".marker";

/// Local materialization of a remote index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: PathBuf,
    /// Remote modification marker at the time of the last download
    pub last_modified: Option<DateTime<Utc>>,
}

/// On-disk marker record
#[derive(Debug, Serialize, Deserialize)]
struct CacheMarker {
    url: String,
    last_modified: Option<DateTime<Utc>>,
    fetched_at: DateTime<Utc>,
}

/// Index cache rooted at a directory
#[derive(Debug, Clone)]
pub struct IndexCache {
    root: PathBuf,
}

impl IndexCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the body of `index` is cached
    pub fn body_path(&self, index: &RemoteIndex) -> PathBuf {
        self.root.join(index.cache_relative_path())
    }

    fn marker_path(body: &Path) -> PathBuf {
        let mut name = body.file_name().unwrap_or_default().to_os_string();
        name.push(MARKER_SUFFIX);
        body.with_file_name(name)
    }

    /// Look up the cached entry for `index`
    ///
    /// An entry exists only if both the body and a readable marker are
    /// present; a corrupt marker is treated as a miss so the index is refetched.
    pub fn lookup(&self, index: &RemoteIndex) -> Result<Option<CacheEntry>> {
        let path = self.body_path(index);
        let marker_path = Self::marker_path(&path);

        if !path.is_file() || !marker_path.is_file() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&marker_path).map_err(|e| {
            Error::IoError(format!("Failed to read {}: {e}", marker_path.display()))
        })?;

        match serde_json::from_str::<CacheMarker>(&raw) {
            Ok(marker) if marker.url == index.url.as_str() => Ok(Some(CacheEntry {
                path,
                last_modified: marker.last_modified,
            })),
            Ok(marker) => {
                warn!(
                    "Cache marker {} belongs to {}, not {}; refetching",
                    marker_path.display(),
                    marker.url,
                    index.url
                );
                Ok(None)
            }
            Err(e) => {
                warn!("Ignoring corrupt cache marker {}: {}", marker_path.display(), e);
                Ok(None)
            }
        }
    }

    /// Store a freshly downloaded body and its marker
    ///
    /// Both files are written to a temporary name and renamed into place;
    /// the body lands first so an interrupted store leaves the old marker,
    /// which forces a refetch next run.
    pub fn store(
        &self,
        index: &RemoteIndex,
        body: &[u8],
        last_modified: Option<DateTime<Utc>>,
    ) -> Result<CacheEntry> {
        let path = self.body_path(index);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
            })?;
        }

        write_atomic(&path, body)?;

        let marker = CacheMarker {
            url: index.url.to_string(),
            last_modified,
            fetched_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&marker)
            .map_err(|e| Error::ParseError(format!("Failed to encode cache marker: {e}")))?;
        write_atomic(&Self::marker_path(&path), &json)?;

        debug!("Cached {} at {}", index.url, path.display());
        Ok(CacheEntry {
            path,
            last_modified,
        })
    }

    /// Refresh mtimes of every directory from `path`'s parent up to the root
    ///
    /// External cache-expiry sweeps key off directory mtime.
    pub fn touch_ancestors(&self, path: &Path) -> Result<()> {
        let now = FileTime::now();
        let mut current = path.parent();

        while let Some(dir) = current {
            if !dir.starts_with(&self.root) {
                break;
            }
            filetime::set_file_mtime(dir, now).map_err(|e| {
                Error::IoError(format!("Failed to touch {}: {e}", dir.display()))
            })?;
            if dir == self.root {
                break;
            }
            current = dir.parent();
        }

        Ok(())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, data).map_err(|e| {
        Error::IoError(format!("Failed to write {}: {e}", temp_path.display()))
    })?;
    fs::rename(&temp_path, path).map_err(|e| {
        Error::IoError(format!(
            "Failed to move {} to {}: {e}",
            temp_path.display(),
            path.display()
        ))
    })
}
