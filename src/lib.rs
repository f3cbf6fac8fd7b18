//! # zipcodec
//!
//! A ZIP archive codec: reading and writing archives, with store and
//! deflate compression, CRC-32 verification, traditional PKWARE password
//! encryption and a directory tree synthesized from entry paths.
//!
//! ## Features
//!
//! - Open archives from files or any random-access source
//! - Extract single entries by index, or all entries as a lazy sequence
//! - Create archives at a chosen compression level, optionally encrypted
//! - Map between entry indices and local header offsets
//! - Progress notifications while extracting
//!
//! ## Example
//!
//! ```no_run
//! use zipcodec::{WriteOptions, ZipArchive};
//!
//! fn main() -> zipcodec::Result<()> {
//!     let mut archive = ZipArchive::create("hello.zip", WriteOptions::new(), true)?;
//!     archive.add_file("readme.txt", b"hello")?;
//!     archive.close()?;
//!
//!     let archive = ZipArchive::open("hello.zip", None)?;
//!     let entry = archive.unzip_file_at_index(0)?;
//!     assert_eq!(entry.name, "readme.txt");
//!     assert_eq!(entry.data.as_deref(), Some(&b"hello"[..]));
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{ErrorKind, Result, ZipError};
pub use io::{ByteCursor, LocalFileReader, ReadAt};
pub use zip::{
    ArchiveMode, CompressionLevel, UnzipObserver, UnzippedEntry, WriteOptions, ZipArchive,
    ZipExtractor, ZipFileEntry, ZipWriter,
};
