// src/pool/assembler.rs

//! Pool assembly from the index cache
//!
//! For each pool, cached documents of every contributing suite are
//! concatenated in configured suite order into one `Sources` and one
//! `Packages_<arch>` file per architecture. No package-level dedup happens
//! here; the decision engine resolves duplicates by package and version.

use crate::compression;
use crate::config::{PoolName, RunContext};
use crate::error::{Error, Result};
use crate::repository::{IndexCache, RemoteIndex, pool_indexes};
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::{PACKAGES_PREFIX, Pool, SOURCES_FILE};

/// Builds both pools from the current cache contents
pub struct PoolAssembler<'a> {
    ctx: &'a RunContext,
    cache: &'a IndexCache,
}

impl<'a> PoolAssembler<'a> {
    pub fn new(ctx: &'a RunContext, cache: &'a IndexCache) -> Self {
        Self { ctx, cache }
    }

    /// Assemble the testing and unstable pools
    pub fn assemble_all(&self) -> Result<Vec<Pool>> {
        PoolName::ALL.into_iter().map(|name| self.assemble(name)).collect()
    }

    /// Regenerate one pool and verify it covers every architecture
    pub fn assemble(&self, name: PoolName) -> Result<Pool> {
        let pool = Pool::layout(self.ctx, name);
        info!("Assembling pool {} in {}", name, pool.root.display());

        fs::create_dir_all(&pool.root).map_err(|e| {
            Error::IoError(format!("Failed to create directory {}: {e}", pool.root.display()))
        })?;
        clear_generated(&pool.root)?;

        let indexes = pool_indexes(self.ctx, name)?;

        let sources: Vec<&RemoteIndex> =
            indexes.iter().filter(|i| i.architecture().is_none()).collect();
        self.concatenate(name, &pool.sources, &sources)?;

        for (arch, path) in &pool.packages {
            let contributors: Vec<&RemoteIndex> = indexes
                .iter()
                .filter(|i| i.architecture() == Some(arch.as_str()))
                .collect();
            self.concatenate(name, path, &contributors)?;
        }

        ensure_hints_link(&pool.hints, &self.ctx.paths.hints_dir)?;
        ensure_control_file(&pool.blocks)?;
        ensure_control_file(&pool.dates)?;

        pool.verify()?;
        Ok(pool)
    }

    /// Concatenate cached contributors into `dest`
    ///
    /// Every contributor must have a cache entry; the first one missing
    /// fails the pool before `dest` is written.
    fn concatenate(
        &self,
        pool: PoolName,
        dest: &Path,
        contributors: &[&RemoteIndex],
    ) -> Result<()> {
        let mut present = Vec::with_capacity(contributors.len());
        for index in contributors {
            match self.cache.lookup(index)? {
                Some(entry) => present.push(entry.path),
                None => {
                    warn!("No cached copy of {} for pool {}", index, pool);
                    return Err(Error::PoolIncomplete {
                        pool: pool.to_string(),
                        architecture: index.architecture().unwrap_or("source").to_string(),
                    });
                }
            }
        }

        let dir = dest.parent().unwrap_or(Path::new("."));
        let temp = NamedTempFile::new_in(dir).map_err(|e| {
            Error::IoError(format!("Failed to create temp file in {}: {e}", dir.display()))
        })?;
        let mut writer = StanzaWriter::new(BufWriter::new(temp));

        for path in &present {
            let written = compression::copy_index(path, &mut writer)
                .map_err(|e| Error::IoError(format!("Failed to merge {}: {e}", path.display())))?;
            writer.end_document()?;
            debug!("Merged {} bytes from {} into {}", written, path.display(), dest.display());
        }

        let temp = writer
            .into_inner()
            .into_inner()
            .map_err(|e| Error::IoError(format!("Failed to flush {}: {}", dest.display(), e.error())))?;
        temp.persist(dest).map_err(|e| {
            Error::IoError(format!("Failed to write {}: {}", dest.display(), e.error))
        })?;

        Ok(())
    }
}

/// Remove index files left by a previous run
fn clear_generated(root: &Path) -> Result<()> {
    let entries = fs::read_dir(root)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", root.display())))?;

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == SOURCES_FILE || name.starts_with(PACKAGES_PREFIX) {
            fs::remove_file(entry.path()).map_err(|e| {
                Error::IoError(format!("Failed to remove {}: {e}", entry.path().display()))
            })?;
        }
    }
    Ok(())
}

/// Point `link` at the shared hints directory
fn ensure_hints_link(link: &Path, hints_dir: &Path) -> Result<()> {
    fs::create_dir_all(hints_dir).map_err(|e| {
        Error::IoError(format!("Failed to create directory {}: {e}", hints_dir.display()))
    })?;

    match fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if fs::read_link(link)? == hints_dir {
                return Ok(());
            }
            debug!("Re-pointing {} to {}", link.display(), hints_dir.display());
            fs::remove_file(link)?;
        }
        Ok(_) => {
            warn!(
                "{} exists and is not a symlink; leaving it in place",
                link.display()
            );
            return Ok(());
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    std::os::unix::fs::symlink(hints_dir, link).map_err(|e| {
        Error::IoError(format!(
            "Failed to link {} -> {}: {e}",
            link.display(),
            hints_dir.display()
        ))
    })
}

/// Create an empty operator control file unless one already exists
fn ensure_control_file(path: &Path) -> Result<()> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => {
            debug!("Created empty {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(Error::IoError(format!(
            "Failed to create {}: {e}",
            path.display()
        ))),
    }
}

/// Writer that keeps concatenated documents' stanzas apart
///
/// Index documents normally end with a blank line; when one does not, the
/// missing separator is added so its last stanza does not run into the
/// next document's first.
struct StanzaWriter<W: Write> {
    inner: W,
    tail: [u8; 2],
    written: usize,
}

impl<W: Write> StanzaWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            tail: [0; 2],
            written: 0,
        }
    }

    fn end_document(&mut self) -> io::Result<()> {
        match (self.written, self.tail) {
            (0, _) | (_, [b'\n', b'\n']) => Ok(()),
            (_, [_, b'\n']) => self.write_all(b"\n"),
            _ => self.write_all(b"\n\n"),
        }?;
        self.written = 0;
        self.tail = [0; 2];
        Ok(())
    }

    fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for StanzaWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        match n {
            0 => {}
            1 => self.tail = [self.tail[1], buf[0]],
            _ => self.tail = [buf[n - 2], buf[n - 1]],
        }
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_context;
    use crate::pool::{BLOCKS_FILE, DATES_FILE};
    use flate2::Compression;
    use flate2::write::GzEncoder;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// Cache every index of the run with a body naming its suite and kind
    fn populate(ctx: &RunContext, cache: &IndexCache, skip_arch: Option<&str>) {
        populate_except(ctx, cache, |index| {
            skip_arch.is_some() && index.architecture() == skip_arch
        });
    }

    fn populate_except(
        ctx: &RunContext,
        cache: &IndexCache,
        skip: impl Fn(&RemoteIndex) -> bool,
    ) {
        for index in crate::repository::declared_indexes(ctx).unwrap() {
            if skip(&index) {
                continue;
            }
            let body = format!("Package: {}-{}\nVersion: 1\n\n", index.pocket, index.kind);
            cache.store(&index, &gzip(body.as_bytes()), None).unwrap();
        }
    }

    #[test]
    fn test_assemble_concatenates_in_suite_order() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let cache = IndexCache::new(&ctx.paths.cache_dir);
        populate(&ctx, &cache, None);

        let pools = PoolAssembler::new(&ctx, &cache).assemble_all().unwrap();

        assert_eq!(pools.len(), 2);
        let unstable = &pools[1];
        assert_eq!(unstable.name, PoolName::Unstable);
        assert_eq!(
            fs::read_to_string(&unstable.sources).unwrap(),
            "Package: noble-source\nVersion: 1\n\n\
             Package: noble-proposed-source\nVersion: 1\n\n"
        );
        assert_eq!(
            fs::read_to_string(&unstable.packages["arm64"]).unwrap(),
            "Package: noble-binary-arm64\nVersion: 1\n\n\
             Package: noble-proposed-binary-arm64\nVersion: 1\n\n"
        );
        assert_eq!(
            fs::read_to_string(&pools[0].packages["amd64"]).unwrap(),
            "Package: noble-binary-amd64\nVersion: 1\n\n"
        );
        assert_eq!(fs::read_link(&unstable.hints).unwrap(), ctx.paths.hints_dir);
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let cache = IndexCache::new(&ctx.paths.cache_dir);
        populate(&ctx, &cache, None);
        let assembler = PoolAssembler::new(&ctx, &cache);

        let first = assembler.assemble(PoolName::Unstable).unwrap();
        let sources = fs::read(&first.sources).unwrap();
        let packages = fs::read(&first.packages["amd64"]).unwrap();

        let second = assembler.assemble(PoolName::Unstable).unwrap();
        assert_eq!(fs::read(&second.sources).unwrap(), sources);
        assert_eq!(fs::read(&second.packages["amd64"]).unwrap(), packages);
    }

    #[test]
    fn test_missing_architecture_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let cache = IndexCache::new(&ctx.paths.cache_dir);
        populate(&ctx, &cache, Some("arm64"));

        let err = PoolAssembler::new(&ctx, &cache)
            .assemble(PoolName::Testing)
            .unwrap_err();

        match err {
            Error::PoolIncomplete { pool, architecture } => {
                assert_eq!(pool, "testing");
                assert_eq!(architecture, "arm64");
            }
            other => panic!("expected PoolIncomplete, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_architecture_in_one_suite_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let cache = IndexCache::new(&ctx.paths.cache_dir);
        populate_except(&ctx, &cache, |index| {
            index.pocket == "noble-proposed" && index.architecture() == Some("arm64")
        });
        let assembler = PoolAssembler::new(&ctx, &cache);

        assembler.assemble(PoolName::Testing).unwrap();
        let err = assembler.assemble(PoolName::Unstable).unwrap_err();

        match err {
            Error::PoolIncomplete { pool, architecture } => {
                assert_eq!(pool, "unstable");
                assert_eq!(architecture, "arm64");
            }
            other => panic!("expected PoolIncomplete, got {other:?}"),
        }
        let unstable = Pool::layout(&ctx, PoolName::Unstable);
        assert!(!unstable.packages["arm64"].exists());
    }

    #[test]
    fn test_missing_sources_in_one_suite_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let cache = IndexCache::new(&ctx.paths.cache_dir);
        populate_except(&ctx, &cache, |index| {
            index.pocket == "noble-proposed" && index.architecture().is_none()
        });

        let err = PoolAssembler::new(&ctx, &cache)
            .assemble(PoolName::Unstable)
            .unwrap_err();

        match err {
            Error::PoolIncomplete { pool, architecture } => {
                assert_eq!(pool, "unstable");
                assert_eq!(architecture, "source");
            }
            other => panic!("expected PoolIncomplete, got {other:?}"),
        }
    }

    #[test]
    fn test_stale_files_do_not_survive_regeneration() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let cache = IndexCache::new(&ctx.paths.cache_dir);
        populate(&ctx, &cache, None);
        let assembler = PoolAssembler::new(&ctx, &cache);
        let pool = assembler.assemble(PoolName::Testing).unwrap();

        let stale = pool.root.join("Packages_i386");
        fs::write(&stale, "Package: old\n").unwrap();
        fs::remove_dir_all(&ctx.paths.cache_dir).unwrap();

        let err = assembler.assemble(PoolName::Testing).unwrap_err();
        assert!(matches!(err, Error::PoolIncomplete { .. }));
        assert!(!stale.exists());
        assert!(!pool.sources.exists());
    }

    #[test]
    fn test_control_files_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let cache = IndexCache::new(&ctx.paths.cache_dir);
        populate(&ctx, &cache, None);
        let assembler = PoolAssembler::new(&ctx, &cache);

        let pool = assembler.assemble(PoolName::Testing).unwrap();
        assert_eq!(fs::read_to_string(&pool.blocks).unwrap(), "");
        assert_eq!(fs::read_to_string(&pool.dates).unwrap(), "");

        fs::write(pool.root.join(BLOCKS_FILE), "hello 1\n").unwrap();
        fs::write(pool.root.join(DATES_FILE), "hello 1.0 19800\n").unwrap();
        assembler.assemble(PoolName::Testing).unwrap();

        assert_eq!(fs::read_to_string(&pool.blocks).unwrap(), "hello 1\n");
        assert_eq!(fs::read_to_string(&pool.dates).unwrap(), "hello 1.0 19800\n");
    }

    #[test]
    fn test_stale_hints_link_is_repointed() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let cache = IndexCache::new(&ctx.paths.cache_dir);
        populate(&ctx, &cache, None);

        let pool = Pool::layout(&ctx, PoolName::Testing);
        let elsewhere = dir.path().join("old-hints");
        fs::create_dir_all(&elsewhere).unwrap();
        fs::create_dir_all(&pool.root).unwrap();
        std::os::unix::fs::symlink(&elsewhere, &pool.hints).unwrap();

        PoolAssembler::new(&ctx, &cache)
            .assemble(PoolName::Testing)
            .unwrap();

        assert_eq!(fs::read_link(&pool.hints).unwrap(), ctx.paths.hints_dir);
        assert!(elsewhere.is_dir());
    }

    #[test]
    fn test_hints_file_is_left_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let cache = IndexCache::new(&ctx.paths.cache_dir);
        populate(&ctx, &cache, None);

        let pool = Pool::layout(&ctx, PoolName::Testing);
        fs::create_dir_all(&pool.root).unwrap();
        fs::write(&pool.hints, "easy hello/1.0\n").unwrap();

        PoolAssembler::new(&ctx, &cache)
            .assemble(PoolName::Testing)
            .unwrap();

        let meta = fs::symlink_metadata(&pool.hints).unwrap();
        assert!(meta.file_type().is_file());
        assert_eq!(fs::read_to_string(&pool.hints).unwrap(), "easy hello/1.0\n");
    }

    #[test]
    fn test_stanza_writer_separates_documents() {
        let mut writer = StanzaWriter::new(Vec::new());
        writer.write_all(b"Package: a").unwrap();
        writer.end_document().unwrap();
        writer.write_all(b"Package: b\n").unwrap();
        writer.end_document().unwrap();
        writer.write_all(b"Package: c\n\n").unwrap();
        writer.end_document().unwrap();
        writer.end_document().unwrap();

        assert_eq!(
            writer.into_inner(),
            b"Package: a\n\nPackage: b\n\nPackage: c\n\n".to_vec()
        );
    }
}
