// src/engine/process.rs

//! Subprocess decision engine
//!
//! Runs `<command> [args...] -c <config> --series <series>` with stdout and
//! stderr captured in the run's log file, optionally bounded by a timeout.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use super::DecisionEngine;

/// Decision engine run as an external program
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    command: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ProcessEngine {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: config.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn wait(&self, child: &mut std::process::Child) -> Result<ExitStatus> {
        let Some(timeout) = self.timeout else {
            return child.wait().map_err(|e| {
                Error::EngineFailure(format!("Failed to wait for {}: {e}", self.command.display()))
            });
        };

        match child.wait_timeout(timeout) {
            Ok(Some(status)) => Ok(status),
            Ok(None) => {
                warn!("Decision engine exceeded {}s, killing it", timeout.as_secs());
                let _ = child.kill();
                let _ = child.wait();
                Err(Error::EngineFailure(format!(
                    "{} timed out after {} seconds",
                    self.command.display(),
                    timeout.as_secs()
                )))
            }
            Err(e) => Err(Error::EngineFailure(format!(
                "Failed to wait for {}: {e}",
                self.command.display()
            ))),
        }
    }
}

impl DecisionEngine for ProcessEngine {
    fn run(&self, config: &Path, series: &str, log: &Path) -> Result<()> {
        let stdout = File::create(log)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", log.display())))?;
        let stderr = stdout.try_clone()?;

        debug!(
            "Executing: {} {:?} -c {} --series {}",
            self.command.display(),
            self.args,
            config.display(),
            series
        );

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg("-c")
            .arg(config)
            .arg("--series")
            .arg(series)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| {
                Error::EngineFailure(format!("Failed to spawn '{}': {e}", self.command.display()))
            })?;

        let status = self.wait(&mut child)?;
        if status.success() {
            Ok(())
        } else {
            let code = status.code().unwrap_or(-1);
            Err(Error::EngineFailure(format!(
                "{} exited with status {}; see {}",
                self.command.display(),
                code,
                log.display()
            )))
        }
    }
}
