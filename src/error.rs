//! Error types for ZIP archive operations.
//!
//! Every fallible operation in this crate returns [`Result<T>`]. Each
//! [`ZipError`] variant carries context for diagnostics, and
//! [`ZipError::kind`] folds it onto the flat [`ErrorKind`] taxonomy that
//! callers can match on without caring about the details.
//!
//! ```rust,no_run
//! use zipcodec::{ErrorKind, ZipArchive};
//!
//! match ZipArchive::open("archive.zip", Some("secret")) {
//!     Ok(archive) => println!("{} entries", archive.file_count()?),
//!     Err(e) if e.kind() == ErrorKind::BadPassword => eprintln!("wrong password"),
//!     Err(e) => return Err(e),
//! }
//! # Ok::<(), zipcodec::ZipError>(())
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::zip::ArchiveMode;

/// Coarse classification of a [`ZipError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The archive could not be opened or created.
    FileOpen,
    /// The operation requires an open archive.
    FileIsNotOpened,
    /// Structural or format violation.
    BadZipFile,
    /// A caller-supplied argument is invalid.
    BadParameter,
    /// Missing or wrong password for an encrypted entry.
    BadPassword,
    /// Invariant violation inside the codec itself.
    InternalError,
    /// Decompressed bytes fail checksum verification.
    Crc,
    /// Read operation on a write handle or vice versa.
    WrongArchiveMode,
    /// The archive path does not exist.
    FileIsNotExist,
    /// Anything else.
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FileOpen => "file open",
            Self::FileIsNotOpened => "file is not opened",
            Self::BadZipFile => "bad zip file",
            Self::BadParameter => "bad parameter",
            Self::BadPassword => "bad password",
            Self::InternalError => "internal error",
            Self::Crc => "CRC",
            Self::WrongArchiveMode => "wrong archive mode",
            Self::FileIsNotExist => "file is not exist",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// The error type for ZIP archive operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ZipError {
    /// The archive file could not be opened or created.
    #[error("cannot open '{}': {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The handle has been closed.
    #[error("archive is not opened")]
    FileIsNotOpened,

    /// The archive is malformed or uses an unsupported feature.
    #[error("bad zip file: {0}")]
    BadZipFile(String),

    /// A caller-supplied argument is out of range or malformed.
    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// The entry is encrypted and the password is missing or wrong.
    #[error("bad password for entry '{entry}'")]
    BadPassword {
        /// Path of the entry that failed verification.
        entry: String,
    },

    /// The codec was driven into a state it does not allow.
    #[error("internal error: {0}")]
    InternalError(&'static str),

    /// The decompressed data does not match the stored checksum.
    #[error("CRC mismatch for entry '{entry}': expected {expected:#010x}, got {actual:#010x}")]
    Crc {
        entry: String,
        expected: u32,
        actual: u32,
    },

    /// The operation is not allowed in the handle's current mode.
    #[error("operation requires {expected} mode, archive is in {actual} mode")]
    WrongArchiveMode {
        expected: ArchiveMode,
        actual: ArchiveMode,
    },

    /// The archive path does not exist.
    #[error("file does not exist: {}", .0.display())]
    FileIsNotExist(PathBuf),

    /// An I/O error while reading or writing archive bytes.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ZipError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileOpen { .. } => ErrorKind::FileOpen,
            Self::FileIsNotOpened => ErrorKind::FileIsNotOpened,
            Self::BadZipFile(_) => ErrorKind::BadZipFile,
            Self::BadParameter(_) => ErrorKind::BadParameter,
            Self::BadPassword { .. } => ErrorKind::BadPassword,
            Self::InternalError(_) => ErrorKind::InternalError,
            Self::Crc { .. } => ErrorKind::Crc,
            Self::WrongArchiveMode { .. } => ErrorKind::WrongArchiveMode,
            Self::FileIsNotExist(_) => ErrorKind::FileIsNotExist,
            // Running off the end of a record means the archive is truncated.
            Self::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => ErrorKind::BadZipFile,
            Self::Io(_) => ErrorKind::Unknown,
        }
    }

    pub(crate) fn bad_zip(msg: impl Into<String>) -> Self {
        Self::BadZipFile(msg.into())
    }
}

/// A specialized `Result` for ZIP archive operations.
pub type Result<T> = std::result::Result<T, ZipError>;
