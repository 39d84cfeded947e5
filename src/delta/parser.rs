// src/delta/parser.rs

//! Delta result parsing
//!
//! [`classify_line`] is a pure function from one line to a tagged class;
//! [`DeltaReader`] applies it lazily over a file in order, without
//! deduplicating repeated entries.

use crate::error::{Error, Result};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

use super::{DeltaEntry, DeltaRecord, Direction, ManualEntry, ManualReason, REMOVAL_MARKER};

static PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9.+-]*$").expect("package pattern is valid"));

// [epoch:]upstream[-revision]; upstream starts with a digit
static VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9]+:)?[0-9][A-Za-z0-9.+~-]*$").expect("version pattern is valid")
});

/// Classification of a single delta line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// Comment, blank or continuation line
    Ignored,
    Source(DeltaEntry),
    Manual(ManualReason),
}

/// Classify one line of a delta result
pub fn classify_line(line: &str) -> LineClass {
    if line.trim().is_empty() || line.starts_with('#') {
        return LineClass::Ignored;
    }
    if line.starts_with([' ', '\t']) {
        return LineClass::Ignored;
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    let [name, version] = fields[..] else {
        return LineClass::Manual(ManualReason::BinaryOnly {
            fields: fields.len(),
        });
    };

    let (package, direction) = match name.strip_prefix(REMOVAL_MARKER) {
        Some(stripped) => (stripped, Direction::Demote),
        None => (name, Direction::Promote),
    };

    if !PACKAGE_NAME.is_match(package) {
        return LineClass::Manual(ManualReason::InvalidName);
    }
    if !VERSION.is_match(version) {
        return LineClass::Manual(ManualReason::InvalidVersion);
    }

    LineClass::Source(DeltaEntry {
        package: package.to_string(),
        version: version.to_string(),
        direction,
    })
}

/// Lazy, ordered reader over a delta result
///
/// Lines that are not valid UTF-8 go to manual review unless they would be
/// ignored anyway (comments, blanks, continuations).
pub struct DeltaReader<R> {
    reader: R,
    buf: Vec<u8>,
    line: usize,
}

impl<R: BufRead> DeltaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line: 0,
        }
    }

    /// Read the next raw line without its terminator; `None` at end of input
    fn next_line(&mut self) -> Option<Result<Vec<u8>>> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
                    self.buf.pop();
                }
                Some(Ok(std::mem::take(&mut self.buf)))
            }
            Err(e) => Some(Err(Error::ParseError(format!(
                "Failed to read delta line {}: {e}",
                self.line + 1
            )))),
        }
    }
}

impl DeltaReader<BufReader<File>> {
    /// Open a delta result file
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::IoError(format!("Failed to open {}: {e}", path.display())))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for DeltaReader<R> {
    type Item = Result<DeltaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let bytes = match self.next_line()? {
                Ok(bytes) => bytes,
                Err(e) => return Some(Err(e)),
            };
            self.line += 1;

            let (raw, class) = match String::from_utf8(bytes) {
                Ok(raw) => {
                    let class = classify_line(&raw);
                    (raw, class)
                }
                Err(e) => {
                    let raw = String::from_utf8_lossy(e.as_bytes()).into_owned();
                    let class = match classify_line(&raw) {
                        LineClass::Ignored => LineClass::Ignored,
                        _ => LineClass::Manual(ManualReason::InvalidEncoding),
                    };
                    (raw, class)
                }
            };

            match class {
                LineClass::Ignored => continue,
                LineClass::Source(entry) => return Some(Ok(DeltaRecord::Source(entry))),
                LineClass::Manual(reason) => {
                    debug!("Delta line {} needs manual review: {}", self.line, reason);
                    return Some(Ok(DeltaRecord::SkipManual(ManualEntry {
                        line: self.line,
                        raw: raw.trim_end().to_string(),
                        reason,
                    })));
                }
            }
        }
    }
}

/// Parse a whole delta held in memory
pub fn parse_str(content: &str) -> Result<Vec<DeltaRecord>> {
    DeltaReader::new(content.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolName;
    use crate::delta::MigrationOperation;

    fn source(records: &[DeltaRecord]) -> Vec<MigrationOperation> {
        records
            .iter()
            .filter_map(|r| match r {
                DeltaRecord::Source(entry) => Some(MigrationOperation::from(entry)),
                DeltaRecord::SkipManual(_) => None,
            })
            .collect()
    }

    fn manual(records: &[DeltaRecord]) -> Vec<&ManualEntry> {
        records
            .iter()
            .filter_map(|r| match r {
                DeltaRecord::SkipManual(m) => Some(m),
                DeltaRecord::Source(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_promote_line() {
        let records = parse_str("libfoo 1.2.3\n").unwrap();
        let ops = source(&records);

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].package, "libfoo");
        assert_eq!(ops[0].version, "1.2.3");
        assert_eq!(ops[0].direction, Direction::Promote);
        assert_eq!((ops[0].source, ops[0].destination), (PoolName::Unstable, PoolName::Testing));
        assert!(manual(&records).is_empty());
    }

    #[test]
    fn test_demote_line() {
        let records = parse_str("-libfoo 1.2.3\n").unwrap();
        let ops = source(&records);

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].package, "libfoo");
        assert_eq!(ops[0].direction, Direction::Demote);
        assert_eq!((ops[0].source, ops[0].destination), (PoolName::Testing, PoolName::Unstable));
    }

    #[test]
    fn test_binary_only_line() {
        let records = parse_str("libfoo 1.2.3 amd64\n").unwrap();

        assert!(source(&records).is_empty());
        let manual = manual(&records);
        assert_eq!(manual.len(), 1);
        assert_eq!(manual[0].line, 1);
        assert_eq!(manual[0].raw, "libfoo 1.2.3 amd64");
        assert_eq!(manual[0].reason, ManualReason::BinaryOnly { fields: 3 });
    }

    #[test]
    fn test_comment_line() {
        assert!(parse_str("# comment\n").unwrap().is_empty());
    }

    #[test]
    fn test_mixed_file_keeps_order_and_duplicates() {
        let content = "\
# Generated by britney
libfoo 1.2.3

-libbar 2:0.9-1ubuntu1
  continuation text
libbaz 1.0 arm64 source
libfoo 1.2.3
";
        let records = parse_str(content).unwrap();
        let ops = source(&records);

        let summary: Vec<(&str, Direction)> =
            ops.iter().map(|op| (op.package.as_str(), op.direction)).collect();
        assert_eq!(
            summary,
            vec![
                ("libfoo", Direction::Promote),
                ("libbar", Direction::Demote),
                ("libfoo", Direction::Promote),
            ]
        );
        assert_eq!(ops[1].version, "2:0.9-1ubuntu1");
        assert_eq!(manual(&records)[0].line, 6);
    }

    #[test]
    fn test_classify_invalid_fields() {
        assert_eq!(
            classify_line("libfoo notaversion"),
            LineClass::Manual(ManualReason::InvalidVersion)
        );
        assert_eq!(classify_line("- 1.0"), LineClass::Manual(ManualReason::InvalidName));
        assert_eq!(
            classify_line("-Bad_Name 1.0"),
            LineClass::Manual(ManualReason::InvalidName)
        );
        assert_eq!(
            classify_line("single"),
            LineClass::Manual(ManualReason::BinaryOnly { fields: 1 })
        );
    }

    #[test]
    fn test_reader_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("HeidiResultDelta");
        std::fs::write(&path, "hello 2.10-3\n-world 1.0\n").unwrap();

        let records: Vec<DeltaRecord> = DeltaReader::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_non_utf8_comment_is_ignored() {
        let input: &[u8] = b"hello 1.0\n# caf\xe9 comment\nworld 2.0\n";
        let records: Vec<DeltaRecord> = DeltaReader::new(input).collect::<Result<_>>().unwrap();
        let ops = source(&records);

        let packages: Vec<&str> = ops.iter().map(|op| op.package.as_str()).collect();
        assert_eq!(packages, vec!["hello", "world"]);
        assert!(manual(&records).is_empty());
    }

    #[test]
    fn test_non_utf8_entry_goes_to_manual_review() {
        let input: &[u8] = b"caf\xe9 1.0\r\nworld 2.0\r\n";
        let records: Vec<DeltaRecord> = DeltaReader::new(input).collect::<Result<_>>().unwrap();

        let manual = manual(&records);
        assert_eq!(manual.len(), 1);
        assert_eq!(manual[0].line, 1);
        assert_eq!(manual[0].raw, "caf\u{fffd} 1.0");
        assert_eq!(manual[0].reason, ManualReason::InvalidEncoding);
        assert_eq!(manual[0].to_string(), "line 1: caf\u{fffd} 1.0 [invalid UTF-8]");
        assert_eq!(source(&records)[0].version, "2.0");
    }
}
