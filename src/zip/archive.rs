//! The archive handle: one byte source, one mode, for its whole life.
//!
//! [`ZipArchive`] is opened either for reading ([`ZipArchive::open`]) or
//! for writing ([`ZipArchive::create`]). Extraction calls on a write
//! handle, and append calls on a read handle, fail with
//! `WrongArchiveMode` and leave the handle untouched. After
//! [`ZipArchive::close`] everything fails with `FileIsNotOpened`.

use chrono::{DateTime, Local};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Result, ZipError};
use crate::io::{LocalFileReader, ReadAt};

use super::codec::CompressionLevel;
use super::extractor::{UnzippedEntries, UnzippedEntry, ZipExtractor};
use super::progress::UnzipObserver;
use super::structures::ZipFileEntry;
use super::tree::EntryTree;
use super::writer::{WriteOptions, WriteSummary, ZipWriter};

type Source = Box<dyn ReadAt>;
type Sink = Box<dyn Write + Send>;

/// What a [`ZipArchive`] handle can currently do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    Read,
    Write,
    Closed,
}

impl fmt::Display for ArchiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArchiveMode::Read => "read",
            ArchiveMode::Write => "write",
            ArchiveMode::Closed => "closed",
        })
    }
}

enum Handle {
    Read(ZipExtractor<Source>),
    Write(ZipWriter<Sink>),
    Closed,
}

/// An open ZIP archive.
pub struct ZipArchive {
    handle: Handle,
    path: Option<PathBuf>,
    name: String,
    observer: Option<Box<dyn UnzipObserver + Send>>,
}

impl ZipArchive {
    /// Open an existing archive for reading.
    ///
    /// # Errors
    ///
    /// `FileIsNotExist` if `path` is absent, `FileOpen` if it cannot be
    /// opened, `BadZipFile` if it is not a readable ZIP archive.
    pub fn open(path: impl AsRef<Path>, password: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let reader = LocalFileReader::new(path).map_err(|e| open_error(path, e))?;
        let mut archive = Self::open_source(reader, display_name(path), password)?;
        archive.path = Some(path.to_path_buf());
        Ok(archive)
    }

    /// Open an archive from any random-access source.
    pub fn open_source<R: ReadAt + 'static>(
        source: R,
        name: impl Into<String>,
        password: Option<&str>,
    ) -> Result<Self> {
        let name = name.into();
        let extractor = ZipExtractor::new(Box::new(source) as Source)?
            .with_name(name.clone())
            .with_password(password);
        Ok(Self {
            handle: Handle::Read(extractor),
            path: None,
            name,
            observer: None,
        })
    }

    /// Create a new archive at `path`.
    ///
    /// # Errors
    ///
    /// `FileOpen` if the destination exists and `overwrite` is false, or if
    /// it cannot be created.
    pub fn create(path: impl AsRef<Path>, options: WriteOptions, overwrite: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = if overwrite {
            File::create(path)
        } else {
            OpenOptions::new().write(true).create_new(true).open(path)
        }
        .map_err(|source| ZipError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;

        let mut archive = Self::create_sink(BufWriter::new(file), display_name(path), options);
        archive.path = Some(path.to_path_buf());
        Ok(archive)
    }

    /// Create a new archive written to any sink.
    pub fn create_sink<W: Write + Send + 'static>(
        sink: W,
        name: impl Into<String>,
        options: WriteOptions,
    ) -> Self {
        Self {
            handle: Handle::Write(ZipWriter::new(Box::new(sink) as Sink, options)),
            path: None,
            name: name.into(),
            observer: None,
        }
    }

    pub fn mode(&self) -> ArchiveMode {
        match self.handle {
            Handle::Read(_) => ArchiveMode::Read,
            Handle::Write(_) => ArchiveMode::Write,
            Handle::Closed => ArchiveMode::Closed,
        }
    }

    pub fn is_opened(&self) -> bool {
        self.mode() != ArchiveMode::Closed
    }

    /// Path the archive was opened from or created at, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register the observer notified during [`ZipArchive::files`].
    pub fn set_observer(&mut self, observer: impl UnzipObserver + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    fn reader(&self) -> Result<&ZipExtractor<Source>> {
        match &self.handle {
            Handle::Read(reader) => Ok(reader),
            Handle::Write(_) => Err(ZipError::WrongArchiveMode {
                expected: ArchiveMode::Read,
                actual: ArchiveMode::Write,
            }),
            Handle::Closed => Err(ZipError::FileIsNotOpened),
        }
    }

    fn writer(&mut self) -> Result<&mut ZipWriter<Sink>> {
        match &mut self.handle {
            Handle::Write(writer) => Ok(writer),
            Handle::Read(_) => Err(ZipError::WrongArchiveMode {
                expected: ArchiveMode::Write,
                actual: ArchiveMode::Read,
            }),
            Handle::Closed => Err(ZipError::FileIsNotOpened),
        }
    }

    /// Entries in the archive, or appended so far when writing.
    pub fn file_count(&self) -> Result<usize> {
        match &self.handle {
            Handle::Read(reader) => Ok(reader.file_count()),
            Handle::Write(writer) => Ok(writer.entries().len()),
            Handle::Closed => Err(ZipError::FileIsNotOpened),
        }
    }

    pub fn comment(&self) -> Result<&str> {
        match &self.handle {
            Handle::Read(reader) => Ok(reader.comment()),
            Handle::Write(writer) => Ok(&writer.options().comment),
            Handle::Closed => Err(ZipError::FileIsNotOpened),
        }
    }

    /// Whether any entry is (or will be) encrypted.
    pub fn encrypted(&self) -> Result<bool> {
        match &self.handle {
            Handle::Read(reader) => Ok(reader.is_encrypted()),
            Handle::Write(writer) => Ok(writer.options().is_encrypted()),
            Handle::Closed => Err(ZipError::FileIsNotOpened),
        }
    }

    /// Replace the password used for encrypted entries.
    pub fn set_password(&mut self, password: Option<&str>) -> Result<()> {
        match &mut self.handle {
            Handle::Read(reader) => {
                reader.set_password(password);
                Ok(())
            }
            Handle::Write(_) => Err(ZipError::WrongArchiveMode {
                expected: ArchiveMode::Read,
                actual: ArchiveMode::Write,
            }),
            Handle::Closed => Err(ZipError::FileIsNotOpened),
        }
    }

    pub fn entries(&self) -> Result<&[ZipFileEntry]> {
        Ok(self.reader()?.list_files())
    }

    pub fn tree(&self) -> Result<&EntryTree> {
        Ok(self.reader()?.tree())
    }

    pub fn unzip_file_at_index(&self, index: usize) -> Result<UnzippedEntry> {
        self.reader()?.unzip_file_at_index(index)
    }

    pub fn offset_at_index(&self, index: usize) -> Result<u64> {
        self.reader()?.offset_at_index(index)
    }

    pub fn index_of_file_offset(&self, offset: u64) -> Result<usize> {
        self.reader()?.index_of_file_offset(offset)
    }

    /// Lazily extract every entry, reporting to the registered observer.
    pub fn files(&mut self) -> Result<UnzippedEntries<'_, '_, Source>> {
        let Self {
            handle, observer, ..
        } = self;
        let reader = match handle {
            Handle::Read(reader) => reader,
            Handle::Write(_) => {
                return Err(ZipError::WrongArchiveMode {
                    expected: ArchiveMode::Read,
                    actual: ArchiveMode::Write,
                });
            }
            Handle::Closed => return Err(ZipError::FileIsNotOpened),
        };
        let observer = observer
            .as_deref_mut()
            .map(|o| o as &mut dyn UnzipObserver);
        Ok(reader.unzip_all(observer))
    }

    pub fn unzip_to_vec(&mut self) -> Result<Vec<UnzippedEntry>> {
        self.files()?.collect()
    }

    pub fn add_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.writer()?.add_file(path, data)?;
        Ok(())
    }

    pub fn add_directory(&mut self, path: &str) -> Result<()> {
        self.writer()?.add_directory(path)?;
        Ok(())
    }

    /// Add a file, or a directory and everything below it, from disk.
    ///
    /// Entry paths are relative to the parent of `path`, so zipping
    /// `/data/photos` yields `photos/...` entries. Symlinks are skipped.
    /// `level` applies to this call's entries and any appended after.
    pub fn zip_file_path(&mut self, path: impl AsRef<Path>, level: CompressionLevel) -> Result<()> {
        let writer = self.writer()?;
        let path = path.as_ref();
        let root = path.canonicalize().map_err(|e| open_error(path, e))?;
        let base = root.parent().unwrap_or(Path::new(""));

        writer.set_level(level);
        for item in WalkDir::new(&root).sort_by_file_name() {
            let item = item.map_err(io::Error::from)?;
            let relative = item
                .path()
                .strip_prefix(base)
                .map_err(|_| ZipError::InternalError("walked outside of the zipped path"))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let modified = item
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(|t| DateTime::<Local>::from(t).naive_local())
                .unwrap_or_else(|| Local::now().naive_local());

            if item.file_type().is_dir() {
                writer.add_directory_at(&name, modified)?;
            } else if item.file_type().is_file() {
                let data = std::fs::read(item.path())?;
                writer.add_file_at(&name, &data, modified)?;
            } else {
                log::warn!("skipping '{}': not a regular file", item.path().display());
            }
        }
        Ok(())
    }

    /// Finalize a write handle and release the source.
    ///
    /// Closing a closed handle is a no-op. If finalizing fails the handle
    /// stays open so the caller can inspect it.
    pub fn close(&mut self) -> Result<Option<WriteSummary>> {
        let summary = match &mut self.handle {
            Handle::Write(writer) if !writer.is_finalized() => Some(writer.finish()?),
            _ => None,
        };
        if let Handle::Write(writer) = std::mem::replace(&mut self.handle, Handle::Closed) {
            writer.into_inner()?.flush()?;
        }
        Ok(summary)
    }
}

impl fmt::Debug for ZipArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipArchive")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl Drop for ZipArchive {
    fn drop(&mut self) {
        if self.is_opened() {
            if let Err(e) = self.close() {
                log::warn!("closing '{}' failed: {}", self.name, e);
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn open_error(path: &Path, source: io::Error) -> ZipError {
    if source.kind() == io::ErrorKind::NotFound {
        ZipError::FileIsNotExist(path.to_path_buf())
    } else {
        ZipError::FileOpen {
            path: path.to_path_buf(),
            source,
        }
    }
}
