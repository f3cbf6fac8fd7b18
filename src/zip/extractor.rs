use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::codec;
use super::crypto::{self, CheckByte};
use super::parser::{CentralDirectory, ZipParser};
use super::progress::{UnzipObserver, fraction};
use super::structures::ZipFileEntry;
use super::tree::{EntryTree, EntryTreeNode};

/// An extracted entry.
///
/// Files carry their bytes and no children. Directories carry no bytes and
/// one child per tree node below them, recursively materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnzippedEntry {
    /// Full path inside the archive, without a trailing slash.
    pub name: String,
    /// `None` for directories.
    pub data: Option<Vec<u8>>,
    /// `None` for inferred directories and unparseable timestamps.
    pub modified: Option<NaiveDateTime>,
    pub children: Vec<UnzippedEntry>,
    pub is_directory: bool,
    /// Local header offset, `None` for directories the archive only implies.
    pub offset: Option<u64>,
}

/// ZIP file extractor
///
/// Owns the byte source and the index built at open time: the Central
/// Directory, the entry tree and the offset lookup. Extraction is
/// read-only, so every method takes `&self`.
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
    directory: CentralDirectory,
    tree: EntryTree,
    offsets: HashMap<u64, usize>,
    password: Option<Vec<u8>>,
    name: String,
}

impl<R: ReadAt> ZipExtractor<R> {
    /// Parse the archive index. Fails with `BadZipFile` on any structural
    /// problem, including unsupported compression methods.
    pub fn new(reader: R) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let directory = parser.read_central_directory()?;
        let tree = EntryTree::build(&directory.entries)?;
        let offsets = directory
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.lfh_offset, i))
            .collect();

        log::debug!(
            "opened archive: {} entries, {} bytes",
            directory.entries.len(),
            parser.size()
        );

        Ok(Self {
            parser,
            directory,
            tree,
            offsets,
            password: None,
            name: String::new(),
        })
    }

    /// Name reported to progress observers.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_password(mut self, password: Option<&str>) -> Self {
        self.set_password(password);
        self
    }

    pub fn set_password(&mut self, password: Option<&str>) {
        self.password = password.map(|p| p.as_bytes().to_vec());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_count(&self) -> usize {
        self.directory.entries.len()
    }

    pub fn comment(&self) -> &str {
        &self.directory.comment
    }

    /// True if any entry is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.directory.entries.iter().any(ZipFileEntry::is_encrypted)
    }

    /// List all files in the archive
    pub fn list_files(&self) -> &[ZipFileEntry] {
        &self.directory.entries
    }

    pub fn tree(&self) -> &EntryTree {
        &self.tree
    }

    pub fn entry(&self, index: usize) -> Result<&ZipFileEntry> {
        self.directory.entries.get(index).ok_or_else(|| {
            ZipError::BadParameter(format!(
                "index {index} out of range for {} entries",
                self.file_count()
            ))
        })
    }

    /// Local header offset of the entry at `index`.
    pub fn offset_at_index(&self, index: usize) -> Result<u64> {
        Ok(self.entry(index)?.lfh_offset)
    }

    /// Index of the entry whose local header starts at `offset`.
    pub fn index_of_file_offset(&self, offset: u64) -> Result<usize> {
        self.offsets
            .get(&offset)
            .copied()
            .ok_or_else(|| ZipError::BadParameter(format!("no entry starts at offset {offset}")))
    }

    /// Extract file data to memory
    ///
    /// Decrypts if needed, decompresses and verifies the CRC. Directories
    /// yield no bytes.
    pub fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        if entry.is_directory {
            return Ok(Vec::new());
        }

        let raw = self
            .parser
            .read_entry_data(entry, self.directory.cd_offset)?;

        if !entry.is_encrypted() {
            return codec::decompress(entry, &raw);
        }

        let bad_password = || ZipError::BadPassword {
            entry: entry.file_name.clone(),
        };
        let password = self.password.as_deref().ok_or_else(bad_password)?;
        let check = if entry.uses_data_descriptor() {
            CheckByte::DosTime(entry.modified.time)
        } else {
            CheckByte::Crc32(entry.crc32)
        };
        let plain = crypto::decrypt_entry(password, check, &raw).ok_or_else(bad_password)?;

        // Past the header check a failure is reported as corruption. The
        // rare wrong password that slips through the single check byte
        // surfaces the same way.
        codec::decompress(entry, &plain)
    }

    /// Extract the entry at `index`, with children for directories.
    pub fn unzip_file_at_index(&self, index: usize) -> Result<UnzippedEntry> {
        let entry = self.entry(index)?;
        if !entry.is_directory {
            return self.unzip_file(entry);
        }

        match self.tree.find(&entry.file_name) {
            Some(node) => self.unzip_directory(node, Some(entry)),
            None => Err(ZipError::InternalError("directory entry missing from tree")),
        }
    }

    /// Lazily extract every entry in archive order.
    ///
    /// Each call starts a fresh pass. The sequence stops after the first
    /// error.
    pub fn unzip_all<'o>(
        &self,
        observer: Option<&'o mut dyn UnzipObserver>,
    ) -> UnzippedEntries<'_, 'o, R> {
        UnzippedEntries {
            extractor: self,
            observer,
            next: 0,
            started: false,
            finished: false,
        }
    }

    /// Extract every entry into a vector.
    pub fn unzip_to_vec(&self, observer: Option<&mut dyn UnzipObserver>) -> Result<Vec<UnzippedEntry>> {
        self.unzip_all(observer).collect()
    }

    fn unzip_file(&self, entry: &ZipFileEntry) -> Result<UnzippedEntry> {
        let data = self.extract_to_memory(entry)?;
        Ok(UnzippedEntry {
            name: entry.file_name.clone(),
            data: Some(data),
            modified: entry.modified.to_naive(),
            children: Vec::new(),
            is_directory: false,
            offset: Some(entry.lfh_offset),
        })
    }

    fn unzip_directory(
        &self,
        node: &EntryTreeNode,
        entry: Option<&ZipFileEntry>,
    ) -> Result<UnzippedEntry> {
        let mut children = Vec::with_capacity(node.children().len());
        for child in node.children() {
            let child_entry = match child.entry_index() {
                Some(i) => Some(self.entry(i)?),
                None => None,
            };
            let payload = match child_entry {
                Some(e) if !e.is_directory => self.unzip_file(e)?,
                _ => self.unzip_directory(child, child_entry)?,
            };
            children.push(payload);
        }

        Ok(UnzippedEntry {
            name: node.path().to_string(),
            data: None,
            modified: entry.and_then(|e| e.modified.to_naive()),
            children,
            is_directory: true,
            offset: entry.map(|e| e.lfh_offset),
        })
    }
}

/// Iterator returned by [`ZipExtractor::unzip_all`].
pub struct UnzippedEntries<'a, 'o, R: ReadAt> {
    extractor: &'a ZipExtractor<R>,
    observer: Option<&'o mut dyn UnzipObserver>,
    next: usize,
    started: bool,
    finished: bool,
}

impl<R: ReadAt> UnzippedEntries<'_, '_, R> {
    fn finish(&mut self) {
        self.finished = true;
        if let Some(observer) = self.observer.as_deref_mut() {
            observer.update_progress(1.0, &self.extractor.name);
            observer.did_end(&self.extractor.name);
        }
    }
}

impl<R: ReadAt> Iterator for UnzippedEntries<'_, '_, R> {
    type Item = Result<UnzippedEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let total = self.extractor.file_count();
        if !self.started {
            self.started = true;
            if let Some(observer) = self.observer.as_deref_mut() {
                observer.will_begin(&self.extractor.name);
                observer.update_progress(fraction(0, total), &self.extractor.name);
            }
        }

        if self.next >= total {
            self.finish();
            return None;
        }

        let index = self.next;
        self.next += 1;
        match self.extractor.unzip_file_at_index(index) {
            Ok(payload) => {
                log::trace!("unzipped '{}'", payload.name);
                if let Some(observer) = self.observer.as_deref_mut() {
                    observer.update_progress(fraction(index + 1, total), &payload.name);
                }
                if self.next == total {
                    self.finish();
                }
                Some(Ok(payload))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            return (0, Some(0));
        }
        let left = self.extractor.file_count() - self.next;
        (0, Some(left))
    }
}
