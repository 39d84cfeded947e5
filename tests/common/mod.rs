// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use proposed_migration::archive::{ArchiveCall, ArchiveClient, ArchiveOutcome};
use proposed_migration::engine::{DELTA_FILE, DecisionEngine};
use proposed_migration::repository::{
    FetchResponse, IndexKind, IndexTransport, RemoteIndex, declared_indexes,
};
use proposed_migration::{Error, Result, RunConfig, RunContext};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use url::Url;

/// Create a two-architecture run context rooted in a fresh temp directory.
///
/// Returns (TempDir, RunContext) - keep the TempDir alive to prevent cleanup.
pub fn setup_context() -> (TempDir, RunContext) {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    std::fs::create_dir_all(root.join("hints")).unwrap();

    let config = RunConfig::from_toml_str(&format!(
        r#"
        series = "noble"
        architectures = ["amd64", "arm64"]
        mirror = "http://archive.test/ubuntu"

        [arch_mirrors]
        arm64 = "http://ports.test/ubuntu-ports"

        [paths]
        cache_dir = "{root}/cache"
        data_dir = "{root}/data"
        output_dir = "{root}/output"
        hints_dir = "{root}/hints"

        [pools.testing]
        suites = ["noble"]

        [pools.unstable]
        suites = ["noble", "noble-proposed"]

        [policy.min_days]
        low = 5

        [engine]
        command = "britney"
        "#,
        root = root.display()
    ))
    .unwrap();

    let ctx = RunContext::new(config, run_stamp()).unwrap();
    (temp_dir, ctx)
}

pub fn run_stamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 2, 13, 5, 9).unwrap()
}

pub fn gzip(content: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// Stanza an index fixture serves: the package name records the suite
pub fn stanza(index: &RemoteIndex) -> String {
    let package = format!("hello-{}", index.pocket);
    match &index.kind {
        IndexKind::Sources => format!("Package: {package}\nVersion: 2.10-3\n"),
        IndexKind::Packages { architecture } => {
            format!("Package: {package}\nVersion: 2.10-3\nArchitecture: {architecture}\n")
        }
    }
}

/// In-memory mirror honouring If-Modified-Since
pub struct FakeTransport {
    documents: Mutex<HashMap<Url, (Vec<u8>, DateTime<Utc>)>>,
    downloads: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Mirror serving a gzipped stanza for every index the run declares
    pub fn serving_all(ctx: &RunContext) -> Self {
        let transport = Self::new();
        for index in declared_indexes(ctx).unwrap() {
            transport.publish(&index.url, gzip(&stanza(&index)), run_stamp());
        }
        transport
    }

    pub fn publish(&self, url: &Url, body: Vec<u8>, modified: DateTime<Utc>) {
        self.documents
            .lock()
            .unwrap()
            .insert(url.clone(), (body, modified));
    }

    pub fn withdraw(&self, url: &Url) {
        self.documents.lock().unwrap().remove(url);
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl IndexTransport for FakeTransport {
    fn fetch(&self, url: &Url, since: Option<DateTime<Utc>>) -> Result<FetchResponse> {
        let documents = self.documents.lock().unwrap();
        let Some((body, modified)) = documents.get(url) else {
            return Err(Error::DownloadError(format!("HTTP 404 for {url}")));
        };
        if since.is_some_and(|since| *modified <= since) {
            return Ok(FetchResponse::NotModified);
        }
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(FetchResponse::Fetched {
            body: body.clone(),
            last_modified: Some(*modified),
        })
    }
}

/// Decision engine that writes a canned delta next to its config
pub struct FakeEngine {
    delta: Option<String>,
    exit_failure: bool,
    pub calls: RefCell<Vec<(PathBuf, String)>>,
}

impl FakeEngine {
    pub fn producing(delta: &str) -> Self {
        Self {
            delta: Some(delta.to_string()),
            exit_failure: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            delta: None,
            exit_failure: true,
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl DecisionEngine for FakeEngine {
    fn run(&self, config: &Path, series: &str, log: &Path) -> Result<()> {
        self.calls
            .borrow_mut()
            .push((config.to_path_buf(), series.to_string()));
        std::fs::write(log, "fake engine\n").unwrap();

        if self.exit_failure {
            return Err(Error::EngineFailure(
                "britney exited with status 1".to_string(),
            ));
        }
        if let Some(delta) = &self.delta {
            let dir = config.parent().unwrap();
            std::fs::write(dir.join(DELTA_FILE), delta).unwrap();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Copy,
    Remove,
}

/// One archive call as the archive saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub package: String,
    pub version: String,
    pub from_suite: String,
    pub to_suite: String,
    pub comment: String,
    pub dry_run: bool,
}

/// Archive that records calls and answers "already applied" on repeats
#[derive(Default)]
pub struct RecordingArchive {
    pub calls: RefCell<Vec<RecordedCall>>,
    done: RefCell<HashSet<(CallKind, String, String, String, String)>>,
    reject: Option<String>,
}

impl RecordingArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive rejecting every call for `package`
    pub fn rejecting(package: &str) -> Self {
        Self {
            reject: Some(package.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, kind: CallKind, call: &ArchiveCall) -> Result<ArchiveOutcome> {
        self.calls.borrow_mut().push(RecordedCall {
            kind,
            package: call.package.clone(),
            version: call.version.clone(),
            from_suite: call.from_suite.clone(),
            to_suite: call.to_suite.clone(),
            comment: call.comment.clone(),
            dry_run: call.dry_run,
        });

        if self.reject.as_deref() == Some(call.package.as_str()) {
            return Err(Error::ArchiveRejected(format!(
                "{} {} is not in {}",
                call.package, call.version, call.from_suite
            )));
        }
        if call.dry_run {
            return Ok(ArchiveOutcome::Applied);
        }

        let key = (
            kind,
            call.package.clone(),
            call.version.clone(),
            call.from_suite.clone(),
            call.to_suite.clone(),
        );
        if self.done.borrow_mut().insert(key) {
            Ok(ArchiveOutcome::Applied)
        } else {
            Ok(ArchiveOutcome::AlreadyApplied)
        }
    }
}

impl ArchiveClient for RecordingArchive {
    fn copy_package(&self, call: &ArchiveCall) -> Result<ArchiveOutcome> {
        self.record(CallKind::Copy, call)
    }

    fn remove_package(&self, call: &ArchiveCall) -> Result<ArchiveOutcome> {
        self.record(CallKind::Remove, call)
    }
}
