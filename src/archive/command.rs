// src/archive/command.rs

//! Archive client backed by the archive admin tools
//!
//! Calls look like:
//!
//! ```text
//! copy-package   -y -b -s <from> --to-suite <to> -e <version> -m <comment> [--dry-run] <package>
//! remove-package -y -s <from> -e <version> -m <comment> [--dry-run] <package>
//! ```
//!
//! Output containing one of the configured "already applied" markers is
//! treated as success whatever the exit status.

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use std::io::{Read, Seek, SeekFrom};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use super::{ArchiveCall, ArchiveClient, ArchiveOutcome};

/// [`ArchiveClient`] that shells out to copy/remove tools
#[derive(Debug, Clone)]
pub struct CommandArchiveClient {
    copy_command: Vec<String>,
    remove_command: Vec<String>,
    markers: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandArchiveClient {
    /// Build from config; command strings are split on whitespace
    pub fn from_config(config: &ArchiveConfig) -> Result<Self> {
        Ok(Self {
            copy_command: split_command("copy_command", &config.copy_command)?,
            remove_command: split_command("remove_command", &config.remove_command)?,
            markers: config
                .already_applied_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            timeout: config.timeout_secs.map(Duration::from_secs),
        })
    }

    fn copy_args(call: &ArchiveCall) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-b".to_string(),
            "-s".to_string(),
            call.from_suite.clone(),
            "--to-suite".to_string(),
            call.to_suite.clone(),
            "-e".to_string(),
            call.version.clone(),
            "-m".to_string(),
            call.comment.clone(),
        ];
        if call.dry_run {
            args.push("--dry-run".to_string());
        }
        args.push(call.package.clone());
        args
    }

    fn remove_args(call: &ArchiveCall) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-s".to_string(),
            call.from_suite.clone(),
            "-e".to_string(),
            call.version.clone(),
            "-m".to_string(),
            call.comment.clone(),
        ];
        if call.dry_run {
            args.push("--dry-run".to_string());
        }
        args.push(call.package.clone());
        args
    }

    fn invoke(&self, command: &[String], args: Vec<String>) -> Result<ArchiveOutcome> {
        let (program, prefix) = command
            .split_first()
            .ok_or_else(|| Error::ArchiveRejected("empty archive command".to_string()))?;

        debug!("Executing: {} {:?} {:?}", program, prefix, args);

        // stdout and stderr share one scratch file
        let mut capture = tempfile::tempfile()?;
        let mut child = Command::new(program)
            .args(prefix)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(capture.try_clone()?))
            .stderr(Stdio::from(capture.try_clone()?))
            .spawn()
            .map_err(|e| Error::ArchiveRejected(format!("Failed to spawn '{program}': {e}")))?;

        let status = self.wait(program, &mut child)?;

        let mut output = String::new();
        capture.seek(SeekFrom::Start(0))?;
        capture.read_to_string(&mut output)?;

        classify_output(program, status, &output, &self.markers)
    }

    fn wait(&self, program: &str, child: &mut Child) -> Result<ExitStatus> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };

        match child.wait_timeout(timeout)? {
            Some(status) => Ok(status),
            None => {
                warn!("{} exceeded {}s, killing it", program, timeout.as_secs());
                let _ = child.kill();
                let _ = child.wait();
                Err(Error::ArchiveRejected(format!(
                    "{program} timed out after {} seconds",
                    timeout.as_secs()
                )))
            }
        }
    }
}

impl ArchiveClient for CommandArchiveClient {
    fn copy_package(&self, call: &ArchiveCall) -> Result<ArchiveOutcome> {
        self.invoke(&self.copy_command, Self::copy_args(call))
    }

    fn remove_package(&self, call: &ArchiveCall) -> Result<ArchiveOutcome> {
        self.invoke(&self.remove_command, Self::remove_args(call))
    }
}

fn split_command(key: &str, raw: &str) -> Result<Vec<String>> {
    let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        return Err(Error::ConfigError(format!("archive.{key} must not be empty")));
    }
    Ok(parts)
}

fn classify_output(
    program: &str,
    status: ExitStatus,
    output: &str,
    markers: &[String],
) -> Result<ArchiveOutcome> {
    let lowered = output.to_lowercase();
    if markers.iter().any(|m| lowered.contains(m.as_str())) {
        debug!("{} reported the change as already applied", program);
        return Ok(ArchiveOutcome::AlreadyApplied);
    }
    if status.success() {
        return Ok(ArchiveOutcome::Applied);
    }

    let reason = output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no output");
    Err(Error::ArchiveRejected(format!(
        "{program} exited with status {}: {reason}",
        status.code().unwrap_or(-1)
    )))
}
