//! Store and deflate (de)compression of a single entry.

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};

use crate::error::{Result, ZipError};

use super::structures::{CompressionMethod, ZipFileEntry};

/// Compression level applied to every entry of an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionLevel {
    /// Entries are stored as-is.
    NoCompression,
    BestSpeed,
    BestCompression,
    #[default]
    Default,
    /// An explicit deflate level between 2 and 8.
    Precise(u32),
}

impl CompressionLevel {
    /// The method entries are written with at this level.
    pub fn method(&self) -> CompressionMethod {
        match self {
            CompressionLevel::NoCompression => CompressionMethod::Stored,
            _ => CompressionMethod::Deflate,
        }
    }

    fn deflate_level(&self) -> Compression {
        match *self {
            CompressionLevel::NoCompression => Compression::none(),
            CompressionLevel::BestSpeed => Compression::fast(),
            CompressionLevel::BestCompression => Compression::best(),
            CompressionLevel::Default => Compression::default(),
            CompressionLevel::Precise(level) => Compression::new(level.clamp(1, 9)),
        }
    }
}

impl TryFrom<i32> for CompressionLevel {
    type Error = ZipError;

    /// Maps the conventional `-1` (default), `0` (none), `1` (fastest)
    /// through `9` (smallest) scale.
    fn try_from(level: i32) -> Result<Self> {
        match level {
            -1 => Ok(CompressionLevel::Default),
            0 => Ok(CompressionLevel::NoCompression),
            1 => Ok(CompressionLevel::BestSpeed),
            9 => Ok(CompressionLevel::BestCompression),
            2..=8 => Ok(CompressionLevel::Precise(level as u32)),
            _ => Err(ZipError::BadParameter(format!(
                "compression level {level} is outside -1..=9"
            ))),
        }
    }
}

/// Compress `data` with `method`.
pub fn compress(method: CompressionMethod, level: CompressionLevel, data: &[u8]) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => Ok(data.to_vec()),
        CompressionMethod::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), level.deflate_level());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        CompressionMethod::Unknown(m) => Err(ZipError::BadParameter(format!(
            "cannot compress with method {m}"
        ))),
    }
}

/// Decompress an entry's (already decrypted) data and verify its size and
/// CRC-32 against the descriptor.
pub fn decompress(entry: &ZipFileEntry, data: &[u8]) -> Result<Vec<u8>> {
    let output = match entry.compression_method {
        CompressionMethod::Stored => data.to_vec(),
        CompressionMethod::Deflate => {
            let mut out = Vec::with_capacity(entry.uncompressed_size.min(1 << 26) as usize);
            // Bound the output so a corrupt stream cannot expand without limit.
            DeflateDecoder::new(data)
                .take(entry.uncompressed_size.saturating_add(1))
                .read_to_end(&mut out)
                .map_err(|e| {
                    ZipError::bad_zip(format!(
                        "corrupt deflate stream in '{}': {e}",
                        entry.file_name
                    ))
                })?;
            out
        }
        CompressionMethod::Unknown(m) => {
            return Err(ZipError::bad_zip(format!(
                "unsupported compression method {m} for '{}'",
                entry.file_name
            )));
        }
    };

    if output.len() as u64 != entry.uncompressed_size {
        return Err(ZipError::bad_zip(format!(
            "'{}' decompressed to {} bytes, expected {}",
            entry.file_name,
            output.len(),
            entry.uncompressed_size
        )));
    }

    let actual = crc32fast::hash(&output);
    if actual != entry.crc32 {
        return Err(ZipError::Crc {
            entry: entry.file_name.clone(),
            expected: entry.crc32,
            actual,
        });
    }

    Ok(output)
}
