// src/compression/mod.rs
//! Index decompression
//!
//! Cached index bodies are stored exactly as the mirror served them. Pool
//! assembly reads them back through [`open_index`], which sniffs the magic
//! bytes and returns a streaming decoder for gzip, xz or plain text.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;

/// Failure reading a cached index
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to open {path}: {source}")]
    Open { path: String, source: io::Error },

    #[error("Failed to decompress {format} data: {source}")]
    Decompression {
        format: &'static str,
        source: io::Error,
    },
}

/// Compression formats mirrors publish indexes in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Plain text index
    None,
    /// `Sources.gz` / `Packages.gz`
    Gzip,
    /// `Sources.xz` / `Packages.xz`
    Xz,
}

impl CompressionFormat {
    /// Sniff the format from a document's leading bytes (`1f 8b` or `fd 37 7a 58 5a 00`)
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b {
            Self::Gzip
        } else if data.len() >= 6 && data[..6] == [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00] {
            Self::Xz
        } else {
            Self::None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Wrap `reader` in the decoder for `format`
pub fn create_decoder<'a, R: Read + 'a>(reader: R, format: CompressionFormat) -> Box<dyn Read + 'a> {
    match format {
        CompressionFormat::None => Box::new(reader),
        CompressionFormat::Gzip => Box::new(flate2::read::MultiGzDecoder::new(reader)),
        CompressionFormat::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
    }
}

/// Open a cached index file, transparently decompressing it
pub fn open_index(path: &Path) -> Result<(CompressionFormat, Box<dyn Read>), CompressionError> {
    let open_err = |source| CompressionError::Open {
        path: path.display().to_string(),
        source,
    };

    let mut file = File::open(path).map_err(open_err)?;
    let mut magic = [0u8; 6];
    let mut filled = 0;
    while filled < magic.len() {
        let n = file.read(&mut magic[filled..]).map_err(open_err)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    file.seek(SeekFrom::Start(0)).map_err(open_err)?;

    let format = CompressionFormat::from_magic_bytes(&magic[..filled]);
    Ok((format, create_decoder(BufReader::new(file), format)))
}

/// Copy a cached index into `writer`, decompressing on the fly
///
/// Returns the number of decompressed bytes written.
pub fn copy_index<W: io::Write>(path: &Path, writer: &mut W) -> Result<u64, CompressionError> {
    let (format, mut reader) = open_index(path)?;
    io::copy(&mut reader, writer).map_err(|source| CompressionError::Decompression {
        format: format.name(),
        source,
    })
}
