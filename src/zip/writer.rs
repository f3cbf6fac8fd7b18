//! ZIP archive creation.
//!
//! Entries are written as soon as they are appended: local header, then the
//! optional encryption header, then the compressed payload. Because each
//! entry is fully buffered before it is written, sizes and CRC go straight
//! into the local header and no data descriptor is needed. [`ZipWriter::finish`]
//! appends the Central Directory and the EOCD record.

use chrono::{Local, NaiveDateTime};
use std::collections::HashSet;
use std::io::Write;

use crate::error::{Result, ZipError};
use crate::io::CountingWriter;

use super::codec::{self, CompressionLevel};
use super::crypto::{self, CheckByte};
use super::structures::{
    CompressionMethod, DosDateTime, EndOfCentralDirectory, FLAG_ENCRYPTED, FLAG_UTF8, ZipFileEntry,
};
use super::tree::normalize_entry_path;

/// Options applied to every entry of an archive.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub(crate) password: Option<String>,
    pub(crate) level: CompressionLevel,
    pub(crate) comment: String,
    pub(crate) require_entries: bool,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypt every file entry with traditional PKWARE encryption.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// Archive comment, at most 65535 bytes.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Make [`ZipWriter::finish`] fail on an archive with no entries.
    pub fn require_entries(mut self, require: bool) -> Self {
        self.require_entries = require;
        self
    }

    pub fn is_encrypted(&self) -> bool {
        self.password.is_some()
    }
}

/// What [`ZipWriter::finish`] wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub entries_written: usize,
    pub bytes_written: u64,
}

/// Streaming ZIP archive writer.
pub struct ZipWriter<W: Write> {
    sink: CountingWriter<W>,
    options: WriteOptions,
    entries: Vec<ZipFileEntry>,
    names: HashSet<String>,
    /// Paths of file entries, which can never gain children.
    files: HashSet<String>,
    /// Every proper prefix of an appended path.
    parents: HashSet<String>,
    finalized: bool,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(sink: W, options: WriteOptions) -> Self {
        Self {
            sink: CountingWriter::new(sink),
            options,
            entries: Vec::new(),
            names: HashSet::new(),
            files: HashSet::new(),
            parents: HashSet::new(),
            finalized: false,
        }
    }

    /// Entries appended so far, in archive order.
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Change the level used for entries appended from now on.
    pub fn set_level(&mut self, level: CompressionLevel) {
        self.options.level = level;
    }

    /// Append a file stamped with the current local time.
    pub fn add_file(&mut self, path: &str, data: &[u8]) -> Result<&ZipFileEntry> {
        self.add_file_at(path, data, Local::now().naive_local())
    }

    pub fn add_file_at(
        &mut self,
        path: &str,
        data: &[u8],
        modified: NaiveDateTime,
    ) -> Result<&ZipFileEntry> {
        self.append(path, data, false, modified)
    }

    /// Append an explicit directory entry stamped with the current local time.
    pub fn add_directory(&mut self, path: &str) -> Result<&ZipFileEntry> {
        self.add_directory_at(path, Local::now().naive_local())
    }

    pub fn add_directory_at(&mut self, path: &str, modified: NaiveDateTime) -> Result<&ZipFileEntry> {
        self.append(path, &[], true, modified)
    }

    fn append(
        &mut self,
        path: &str,
        data: &[u8],
        is_directory: bool,
        modified: NaiveDateTime,
    ) -> Result<&ZipFileEntry> {
        if self.finalized {
            return Err(ZipError::InternalError(
                "entry appended after the archive was finalized",
            ));
        }

        let (file_name, _) = normalize_entry_path(path)
            .map_err(|_| ZipError::BadParameter(format!("invalid entry path {path:?}")))?;
        if self.names.contains(&file_name) {
            return Err(ZipError::BadParameter(format!(
                "duplicate entry path '{file_name}'"
            )));
        }
        if let Some(file) = path_prefixes(&file_name).find(|p| self.files.contains(*p)) {
            return Err(ZipError::BadParameter(format!(
                "'{file_name}' would sit below the file '{file}'"
            )));
        }
        if !is_directory && self.parents.contains(&file_name) {
            return Err(ZipError::BadParameter(format!(
                "'{file_name}' is already a directory"
            )));
        }
        if self.entries.len() >= u16::MAX as usize {
            return Err(ZipError::BadParameter(
                "too many entries for an archive without ZIP64".to_string(),
            ));
        }
        if data.len() as u64 >= u32::MAX as u64 {
            return Err(ZipError::BadParameter(format!(
                "'{file_name}' is too large for an archive without ZIP64"
            )));
        }

        let level = self.options.level;
        let method = if is_directory {
            CompressionMethod::Stored
        } else {
            level.method()
        };
        let crc32 = crc32fast::hash(data);
        let mut payload = codec::compress(method, level, data)?;

        let mut flags = 0;
        if !file_name.is_ascii() {
            flags |= FLAG_UTF8;
        }
        if let (Some(password), false) = (&self.options.password, is_directory) {
            flags |= FLAG_ENCRYPTED;
            payload = crypto::encrypt_entry(
                password.as_bytes(),
                CheckByte::Crc32(crc32),
                &payload,
                &mut rand::thread_rng(),
            );
        }

        let lfh_offset = self.sink.position();
        if lfh_offset + payload.len() as u64 >= u32::MAX as u64 {
            return Err(ZipError::BadParameter(
                "archive too large without ZIP64".to_string(),
            ));
        }

        let entry = ZipFileEntry {
            file_name,
            compression_method: method,
            compressed_size: payload.len() as u64,
            uncompressed_size: data.len() as u64,
            crc32,
            lfh_offset,
            flags,
            modified: DosDateTime::from_naive(&modified),
            is_directory,
        };

        entry.write_local_header(&mut self.sink)?;
        self.sink.write_all(&payload)?;

        log::trace!(
            "wrote '{}': {} -> {} bytes at {}",
            entry.file_name,
            entry.uncompressed_size,
            entry.compressed_size,
            entry.lfh_offset
        );

        self.names.insert(entry.file_name.clone());
        if !entry.is_directory {
            self.files.insert(entry.file_name.clone());
        }
        self.parents
            .extend(path_prefixes(&entry.file_name).map(str::to_string));
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Write the Central Directory and EOCD record.
    ///
    /// # Errors
    ///
    /// `InternalError` if called twice, or on an empty archive when the
    /// options require entries. `BadParameter` if the comment is too long.
    pub fn finish(&mut self) -> Result<WriteSummary> {
        if self.finalized {
            return Err(ZipError::InternalError("archive already finalized"));
        }
        if self.options.require_entries && self.entries.is_empty() {
            return Err(ZipError::InternalError("archive has no entries"));
        }
        let comment = self.options.comment.as_bytes();
        if comment.len() > u16::MAX as usize {
            return Err(ZipError::BadParameter(format!(
                "archive comment is {} bytes, the limit is {}",
                comment.len(),
                u16::MAX
            )));
        }

        let cd_offset = self.sink.position();
        for entry in &self.entries {
            entry.write_central_header(&mut self.sink)?;
        }
        let cd_size = self.sink.position() - cd_offset;
        if cd_offset + cd_size >= u32::MAX as u64 {
            return Err(ZipError::BadParameter(
                "archive too large without ZIP64".to_string(),
            ));
        }

        let count = self.entries.len() as u16;
        let eocd = EndOfCentralDirectory {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: count,
            total_entries: count,
            cd_size: cd_size as u32,
            cd_offset: cd_offset as u32,
            comment_len: comment.len() as u16,
        };
        eocd.write_to(&mut self.sink, comment)?;
        self.sink.flush()?;
        self.finalized = true;

        let summary = WriteSummary {
            entries_written: self.entries.len(),
            bytes_written: self.sink.position(),
        };
        log::debug!(
            "finalized archive: {} entries, {} bytes",
            summary.entries_written,
            summary.bytes_written
        );
        Ok(summary)
    }

    /// Get the sink back. Only allowed once the archive is finalized.
    pub fn into_inner(self) -> Result<W> {
        if !self.finalized {
            return Err(ZipError::InternalError("archive was not finalized"));
        }
        Ok(self.sink.into_inner())
    }
}

/// `a`, `a/b` for `a/b/c`.
fn path_prefixes(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(i, _)| &path[..i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_append_after_finish_fails() {
        let mut writer = ZipWriter::new(Vec::new(), WriteOptions::new());
        writer.add_file("a.txt", b"a").unwrap();
        writer.finish().unwrap();

        let err = writer.add_file("b.txt", b"b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert_eq!(writer.finish().unwrap_err().kind(), ErrorKind::InternalError);
        assert_eq!(writer.entries().len(), 1);
    }

    #[test]
    fn test_require_entries() {
        let mut writer = ZipWriter::new(Vec::new(), WriteOptions::new().require_entries(true));
        assert_eq!(writer.finish().unwrap_err().kind(), ErrorKind::InternalError);
        assert!(!writer.is_finalized());

        writer.add_directory("empty").unwrap();
        writer.finish().unwrap();
        assert!(writer.into_inner().is_ok());
    }

    #[test]
    fn test_empty_archive_is_bare_eocd() {
        let mut writer = ZipWriter::new(Vec::new(), WriteOptions::new());
        let summary = writer.finish().unwrap();
        assert_eq!(summary.entries_written, 0);
        assert_eq!(summary.bytes_written, EndOfCentralDirectory::SIZE as u64);
        let bytes = writer.into_inner().unwrap();
        assert_eq!(&bytes[..4], EndOfCentralDirectory::SIGNATURE);
    }

    #[test]
    fn test_rejects_bad_paths() {
        let mut writer = ZipWriter::new(Vec::new(), WriteOptions::new());
        for path in ["", "/", "../up.txt", "a/../../b"] {
            assert_eq!(
                writer.add_file(path, b"x").unwrap_err().kind(),
                ErrorKind::BadParameter,
                "{path:?}"
            );
        }
        writer.add_file("/lead/slash.txt", b"x").unwrap();
        assert_eq!(writer.entries()[0].file_name, "lead/slash.txt");
        assert_eq!(
            writer.add_file("lead/slash.txt", b"y").unwrap_err().kind(),
            ErrorKind::BadParameter
        );
    }

    #[test]
    fn test_file_and_directory_paths_cannot_collide() {
        let mut writer = ZipWriter::new(Vec::new(), WriteOptions::new());
        writer.add_file("a", b"file").unwrap();
        for path in ["a/b.txt", "a/deeper/c.txt"] {
            assert_eq!(
                writer.add_file(path, b"x").unwrap_err().kind(),
                ErrorKind::BadParameter,
                "{path:?}"
            );
        }
        assert_eq!(
            writer.add_directory("a/sub").unwrap_err().kind(),
            ErrorKind::BadParameter
        );

        writer.add_file("d/e/f.txt", b"x").unwrap();
        for path in ["d", "d/e"] {
            assert_eq!(
                writer.add_file(path, b"x").unwrap_err().kind(),
                ErrorKind::BadParameter,
                "{path:?}"
            );
        }
        // An explicit entry for an implied directory is fine.
        writer.add_directory("d/e").unwrap();
        writer.add_file("d/g.txt", b"x").unwrap();
        assert_eq!(writer.entries().len(), 4);
    }

    #[test]
    fn test_path_prefixes() {
        assert_eq!(path_prefixes("a/b/c").collect::<Vec<_>>(), ["a", "a/b"]);
        assert_eq!(path_prefixes("a").count(), 0);
    }

    #[test]
    fn test_into_inner_requires_finish() {
        let writer = ZipWriter::new(Vec::new(), WriteOptions::new());
        assert_eq!(writer.into_inner().unwrap_err().kind(), ErrorKind::InternalError);
    }

    #[test]
    fn test_encryption_flags_files_only() {
        let mut writer = ZipWriter::new(Vec::new(), WriteOptions::new().password("pw"));
        writer.add_directory("d").unwrap();
        writer.add_file("d/f.txt", b"data").unwrap();
        writer.add_file("d/ü.txt", b"data").unwrap();

        let entries = writer.entries();
        assert!(!entries[0].is_encrypted());
        assert!(entries[1].is_encrypted());
        assert_eq!(entries[2].flags & FLAG_UTF8, FLAG_UTF8);
    }
}
