//! ZIP archive reading and writing.
//!
//! ## Architecture
//!
//! - [`structures`]: on-disk records (EOCD, headers), MS-DOS timestamps and the entry descriptor
//! - [`parser`]: locating the EOCD and indexing the Central Directory
//! - [`tree`]: the directory hierarchy derived from entry paths
//! - [`crypto`]: traditional PKWARE encryption
//! - [`codec`]: store/deflate and CRC-32 verification
//! - [`extractor`]: on-demand extraction on top of the index
//! - [`writer`]: archive creation
//! - [`archive`]: the mode-checked handle tying reader and writer together
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! This implementation reads the EOCD first (from the end of the file),
//! then the Central Directory, so the whole index is known before any
//! entry data is touched.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - STORED (no compression) and DEFLATE methods
//! - Traditional PKWARE encryption, including Info-ZIP's data-descriptor variant
//!
//! ## Limitations
//!
//! - No ZIP64 extensions
//! - No multi-disk archive support
//! - No AES or other strong encryption
//! - No BZIP2, LZMA, or other compression methods

pub mod archive;
pub mod codec;
pub mod crypto;
pub mod extractor;
pub mod parser;
pub mod progress;
pub mod structures;
pub mod tree;
pub mod writer;

pub use archive::{ArchiveMode, ZipArchive};
pub use codec::CompressionLevel;
pub use extractor::{UnzippedEntries, UnzippedEntry, ZipExtractor};
pub use parser::{CentralDirectory, ZipParser};
pub use progress::{ProgressEvent, UnzipObserver};
pub use structures::*;
pub use tree::{EntryTree, EntryTreeNode};
pub use writer::{WriteOptions, WriteSummary, ZipWriter};
