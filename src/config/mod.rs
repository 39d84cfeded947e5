// src/config/mod.rs

//! Run configuration
//!
//! A run is described by a TOML file naming the target series, the
//! architectures and components to consider, which suites contribute to
//! each pool, and the pass-through policy knobs handed to the decision
//! engine. The file is parsed into [`RunConfig`] and then frozen into a
//! [`RunContext`] that every pipeline component receives by reference.

mod context;

pub use context::{PoolName, PoolSpec, RunContext};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level run configuration as written by the operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Target series (e.g. "noble")
    pub series: String,

    /// Architectures every pool must cover
    pub architectures: Vec<String>,

    /// Archive components to merge into each pool
    #[serde(default = "default_components")]
    pub components: Vec<String>,

    /// Default mirror base URL
    pub mirror: String,

    /// Per-architecture mirror overrides (ports mirrors)
    #[serde(default)]
    pub arch_mirrors: BTreeMap<String, String>,

    pub paths: PathsConfig,

    pub pools: PoolsConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    pub engine: EngineConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,
}

fn default_components() -> Vec<String> {
    vec!["main".to_string()]
}

/// Filesystem locations used by a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Persistent index cache, shared across runs
    pub cache_dir: PathBuf,

    /// Root for the regenerated pool directories
    pub data_dir: PathBuf,

    /// Root for per-run engine output
    pub output_dir: PathBuf,

    /// Shared operator hints directory
    pub hints_dir: PathBuf,

    /// Engine config template; the built-in template is used when unset
    #[serde(default)]
    pub template: Option<PathBuf>,
}

/// Suites contributing to the two pools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolsConfig {
    pub testing: PoolConfig,
    pub unstable: PoolConfig,
}

/// One pool's contributing suites, in concatenation order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub suites: Vec<String>,

    /// Archive suite used as copy/remove location for this pool
    #[serde(default)]
    pub archive_suite: Option<String>,
}

/// Operator-tunable knobs passed through to the decision engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub min_days: MinDays,

    /// Operator name -> permitted hint types
    #[serde(default)]
    pub hint_permissions: BTreeMap<String, Vec<String>>,

    /// Sections eligible for smooth updates
    #[serde(default)]
    pub smooth_updates: Vec<String>,

    /// Architectures where breaking installability is tolerated
    #[serde(default)]
    pub break_architectures: Vec<String>,

    /// Architectures that must not break arch:all packages
    #[serde(default)]
    pub nobreakall_architectures: Vec<String>,
}

/// Minimum soak days per upload urgency
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinDays {
    #[serde(default)]
    pub low: u32,
    #[serde(default)]
    pub medium: u32,
    #[serde(default)]
    pub high: u32,
    #[serde(default)]
    pub critical: u32,
    #[serde(default)]
    pub emergency: u32,
}

/// Decision engine invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine executable
    pub command: PathBuf,

    /// Arguments placed before the generated ones (e.g. an interpreter's script path)
    #[serde(default)]
    pub args: Vec<String>,

    /// Kill the engine after this many seconds (wait indefinitely when unset)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Archive mutation tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_copy_command")]
    pub copy_command: String,

    #[serde(default = "default_remove_command")]
    pub remove_command: String,

    /// Output fragments that mean the call was already applied
    #[serde(default = "default_already_applied_markers")]
    pub already_applied_markers: Vec<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            copy_command: default_copy_command(),
            remove_command: default_remove_command(),
            already_applied_markers: default_already_applied_markers(),
            timeout_secs: None,
        }
    }
}

fn default_copy_command() -> String {
    "copy-package".to_string()
}

fn default_remove_command() -> String {
    "remove-package".to_string()
}

fn default_already_applied_markers() -> Vec<String> {
    vec![
        "already copied".to_string(),
        "already exists".to_string(),
        "is not published".to_string(),
    ]
}

impl RunConfig {
    /// Load a run configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a run configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigError(describe_toml_error(content, &e)))
    }
}

/// One-line form of a TOML error: `Invalid run config at line L, column C: message`
fn describe_toml_error(content: &str, err: &toml::de::Error) -> String {
    let message = err
        .message()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("; ");

    match err.span() {
        Some(span) => {
            let before = content.get(..span.start).unwrap_or(content);
            let line = before.matches('\n').count() + 1;
            let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
            format!("Invalid run config at line {line}, column {column}: {message}")
        }
        None => format!("Invalid run config: {message}"),
    }
}

/// Two-architecture context rooted in a scratch directory
#[cfg(test)]
pub(crate) fn test_context(root: &Path) -> RunContext {
    use chrono::TimeZone;

    let config = RunConfig::from_toml_str(&format!(
        r#"
        series = "noble"
        architectures = ["amd64", "arm64"]
        mirror = "http://archive.example.com/ubuntu"

        [paths]
        cache_dir = "{root}/cache"
        data_dir = "{root}/data"
        output_dir = "{root}/output"
        hints_dir = "{root}/hints"

        [pools.testing]
        suites = ["noble"]

        [pools.unstable]
        suites = ["noble", "noble-proposed"]

        [engine]
        command = "britney"
        "#,
        root = root.display()
    ))
    .expect("test config parses");

    let stamp = chrono::Utc
        .with_ymd_and_hms(2024, 4, 2, 13, 5, 9)
        .single()
        .expect("valid timestamp");
    RunContext::new(config, stamp).expect("test config validates")
}
