// src/config/context.rs

//! Immutable per-run context
//!
//! Built once from a validated [`RunConfig`] and a run timestamp. Components
//! never read process-wide state; everything they need comes from here.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use url::Url;

use super::{ArchiveConfig, EngineConfig, PathsConfig, PolicyConfig, PoolConfig, RunConfig};

/// The two pools handed to the decision engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolName {
    Testing,
    Unstable,
}

impl PoolName {
    pub const ALL: [PoolName; 2] = [PoolName::Testing, PoolName::Unstable];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Testing => "testing",
            Self::Unstable => "unstable",
        }
    }
}

impl fmt::Display for PoolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pool's resolved membership
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSpec {
    pub name: PoolName,
    /// Contributing suites in concatenation order
    pub suites: Vec<String>,
    /// Archive location used for copy/remove calls
    pub archive_suite: String,
}

/// Everything a run needs, fixed at startup
#[derive(Debug, Clone)]
pub struct RunContext {
    pub series: String,
    pub architectures: Vec<String>,
    pub components: Vec<String>,
    pub mirror: Url,
    pub arch_mirrors: BTreeMap<String, Url>,
    pub paths: PathsConfig,
    pub testing: PoolSpec,
    pub unstable: PoolSpec,
    pub policy: PolicyConfig,
    pub engine: EngineConfig,
    pub archive: ArchiveConfig,
    pub run_stamp: DateTime<Utc>,
}

impl RunContext {
    /// Validate a configuration and freeze it for one run
    pub fn new(config: RunConfig, run_stamp: DateTime<Utc>) -> Result<Self> {
        if config.series.trim().is_empty() {
            return Err(Error::ConfigError("series must not be empty".to_string()));
        }
        if config.architectures.is_empty() {
            return Err(Error::ConfigError(
                "at least one architecture must be declared".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for arch in &config.architectures {
            if !seen.insert(arch.as_str()) {
                return Err(Error::ConfigError(format!("duplicate architecture '{arch}'")));
            }
        }
        if config.components.is_empty() {
            return Err(Error::ConfigError(
                "at least one component must be declared".to_string(),
            ));
        }

        let mirror = parse_mirror(&config.mirror)?;
        let mut arch_mirrors = BTreeMap::new();
        for (arch, url) in &config.arch_mirrors {
            if !config.architectures.contains(arch) {
                return Err(Error::ConfigError(format!(
                    "mirror override for undeclared architecture '{arch}'"
                )));
            }
            arch_mirrors.insert(arch.clone(), parse_mirror(url)?);
        }

        let testing = resolve_pool(
            PoolName::Testing,
            &config.pools.testing,
            config.series.clone(),
        )?;
        let unstable = resolve_pool(
            PoolName::Unstable,
            &config.pools.unstable,
            format!("{}-proposed", config.series),
        )?;

        Ok(Self {
            series: config.series,
            architectures: config.architectures,
            components: config.components,
            mirror,
            arch_mirrors,
            paths: config.paths,
            testing,
            unstable,
            policy: config.policy,
            engine: config.engine,
            archive: config.archive,
            run_stamp,
        })
    }

    pub fn pool(&self, name: PoolName) -> &PoolSpec {
        match name {
            PoolName::Testing => &self.testing,
            PoolName::Unstable => &self.unstable,
        }
    }

    /// Mirror serving indexes for an architecture (`None` for sources)
    pub fn mirror_for(&self, architecture: Option<&str>) -> &Url {
        architecture
            .and_then(|arch| self.arch_mirrors.get(arch))
            .unwrap_or(&self.mirror)
    }

    /// Directory holding a pool's regenerated snapshot
    pub fn pool_dir(&self, name: PoolName) -> PathBuf {
        self.paths.data_dir.join(&self.series).join(name.as_str())
    }

    /// Timestamp tag identifying this run's output
    pub fn run_tag(&self) -> String {
        self.run_stamp.format("%Y%m%d%H%M%S").to_string()
    }

    /// Run-scoped engine output directory
    pub fn run_dir(&self) -> PathBuf {
        self.paths
            .output_dir
            .join(&self.series)
            .join(self.run_tag())
    }
}

fn parse_mirror(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::ConfigError(format!("Invalid mirror URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" | "file" => Ok(url),
        other => Err(Error::ConfigError(format!(
            "Unsupported mirror scheme '{other}' in '{raw}'"
        ))),
    }
}

fn resolve_pool(name: PoolName, config: &PoolConfig, default_suite: String) -> Result<PoolSpec> {
    if config.suites.is_empty() {
        return Err(Error::ConfigError(format!(
            "pool '{name}' has no contributing suites"
        )));
    }
    Ok(PoolSpec {
        name,
        suites: config.suites.clone(),
        archive_suite: config.archive_suite.clone().unwrap_or(default_suite),
    })
}
