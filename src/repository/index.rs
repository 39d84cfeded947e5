// src/repository/index.rs

//! Remote index descriptors
//!
//! Every run declares a fixed set of `Sources` and `Packages` documents to
//! mirror. Descriptors are derived from the run context, validated before
//! any fetch starts, and identified by URL.

use crate::config::{PoolName, RunContext};
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// What an index document describes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Source package index
    Sources,
    /// Binary package index for one architecture
    Packages { architecture: String },
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sources => write!(f, "source"),
            Self::Packages { architecture } => write!(f, "binary-{architecture}"),
        }
    }
}

/// One fetchable index document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteIndex {
    pub url: Url,
    /// Suite the document belongs to (e.g. "noble-proposed")
    pub pocket: String,
    pub component: String,
    pub kind: IndexKind,
}

impl RemoteIndex {
    /// Describe `dists/<pocket>/<component>/source/Sources.gz` under `mirror`
    pub fn sources(mirror: &Url, pocket: &str, component: &str) -> Result<Self> {
        Self::build(mirror, pocket, component, IndexKind::Sources)
    }

    /// Describe `dists/<pocket>/<component>/binary-<arch>/Packages.gz` under `mirror`
    pub fn packages(mirror: &Url, pocket: &str, component: &str, architecture: &str) -> Result<Self> {
        Self::build(
            mirror,
            pocket,
            component,
            IndexKind::Packages {
                architecture: architecture.to_string(),
            },
        )
    }

    fn build(mirror: &Url, pocket: &str, component: &str, kind: IndexKind) -> Result<Self> {
        check_segment("pocket", pocket)?;
        check_segment("component", component)?;

        let leaf = match &kind {
            IndexKind::Sources => format!("dists/{pocket}/{component}/source/Sources.gz"),
            IndexKind::Packages { architecture } => {
                check_segment("architecture", architecture)?;
                format!("dists/{pocket}/{component}/binary-{architecture}/Packages.gz")
            }
        };

        // Url::join drops the last segment of a base without a trailing slash
        let mut base = mirror.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let url = base
            .join(&leaf)
            .map_err(|e| Error::ConfigError(format!("Invalid index URL for {leaf}: {e}")))?;

        Ok(Self {
            url,
            pocket: pocket.to_string(),
            component: component.to_string(),
            kind,
        })
    }

    /// Architecture of a binary index
    pub fn architecture(&self) -> Option<&str> {
        match &self.kind {
            IndexKind::Sources => None,
            IndexKind::Packages { architecture } => Some(architecture),
        }
    }

    /// Cache location relative to the cache root: `<pocket>/<subdir>/<file>`
    ///
    /// The subdirectory is taken from the URL path below `dists/<pocket>/`,
    /// falling back to the whole URL path for non-standard layouts.
    pub fn cache_relative_path(&self) -> PathBuf {
        let segments: Vec<&str> = self
            .url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty() && *seg != "..").collect())
            .unwrap_or_default();

        let tail = segments
            .windows(2)
            .position(|pair| pair[0] == "dists" && pair[1] == self.pocket)
            .map(|idx| &segments[idx + 2..])
            .unwrap_or(&segments[..]);

        let mut path = PathBuf::from(&self.pocket);
        path.extend(tail);
        path
    }
}

impl fmt::Display for RemoteIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.pocket, self.component, self.kind)
    }
}

fn check_segment(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains('/') || value == "." || value == ".." {
        return Err(Error::ConfigError(format!("Invalid {what} name '{value}'")));
    }
    Ok(())
}

/// Indexes contributing to one pool, in concatenation order
///
/// Order is suite, then component, then `Sources` followed by each
/// architecture in declaration order.
pub fn pool_indexes(ctx: &RunContext, pool: PoolName) -> Result<Vec<RemoteIndex>> {
    let spec = ctx.pool(pool);
    let mut indexes = Vec::new();

    for suite in &spec.suites {
        for component in &ctx.components {
            indexes.push(RemoteIndex::sources(ctx.mirror_for(None), suite, component)?);
            for arch in &ctx.architectures {
                indexes.push(RemoteIndex::packages(
                    ctx.mirror_for(Some(arch)),
                    suite,
                    component,
                    arch,
                )?);
            }
        }
    }

    Ok(indexes)
}

/// Every index the run needs, deduplicated by URL
pub fn declared_indexes(ctx: &RunContext) -> Result<Vec<RemoteIndex>> {
    let mut seen = HashSet::new();
    let mut indexes = Vec::new();

    for pool in PoolName::ALL {
        for index in pool_indexes(ctx, pool)? {
            if seen.insert(index.url.clone()) {
                indexes.push(index);
            }
        }
    }

    Ok(indexes)
}
