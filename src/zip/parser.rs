//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. Read the Central Directory to get metadata for all files
//! 3. Check that the entries' data ranges are sane before anything is extracted
//! 4. For extraction, read each file's Local File Header and data
//!
//! Everything that can be rejected up front is rejected here: a caller that
//! got a [`CentralDirectory`] back will not learn about an unsupported
//! compression method halfway through extraction.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};

use crate::error::{Result, ZipError};
use crate::io::{ByteCursor, ReadAt};

use super::structures::*;
use super::tree::normalize_entry_path;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// The parsed Central Directory of an archive.
#[derive(Debug, Clone)]
pub struct CentralDirectory {
    /// Entries in Central Directory order.
    pub entries: Vec<ZipFileEntry>,
    /// Archive comment, lossily decoded as UTF-8.
    pub comment: String,
    /// Offset of the first Central Directory record.
    pub cd_offset: u64,
    /// Size in bytes of the Central Directory.
    pub cd_size: u64,
}

/// Low-level ZIP file parser.
///
/// This struct handles reading and parsing ZIP structures from
/// a data source. It's generic over the reader type to support
/// both local files and in-memory buffers.
///
/// ## Usage
///
/// Typically used through [`ZipExtractor`](super::ZipExtractor)
/// rather than directly.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(reader);
/// let directory = parser.read_central_directory()?;
/// for entry in &directory.entries {
///     let data = parser.read_entry_data(entry, directory.cd_offset)?;
///     // Decrypt and decompress...
/// }
/// ```
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: R,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    /// Create a new parser for the given reader.
    pub fn new(reader: R) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The EOCD is located at the end of the ZIP file. This method
    /// handles both the simple case (no comment) and archives with
    /// comments by searching backwards for the signature.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    ///
    /// # Errors
    ///
    /// Returns `BadZipFile` if no valid EOCD can be found, indicating
    /// the file is not a valid ZIP archive.
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            return Err(ZipError::bad_zip("file too small to be a ZIP archive"));
        }

        // Optimization: First try the simple case where there's no comment.
        // This avoids reading extra data in the common case.
        let offset = self.size - eocd_size;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_exact_at(offset, &mut buf)?;
        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            if directory_fits(&eocd, offset) {
                return Ok((eocd, offset));
            }
        }

        // EOCD not at expected location - search for it.
        // The EOCD could be earlier if there's a ZIP comment.
        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf)?;

        // Search backwards for EOCD signature (PK\x05\x06)
        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment length field must account for exactly the
                // bytes that follow the record.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    // A comment may itself contain an EOCD-shaped record.
                    let offset = search_start + i as u64;
                    if directory_fits(&eocd, offset) {
                        return Ok((eocd, offset));
                    }
                    log::debug!("skipping EOCD candidate at {offset}: directory does not fit");
                }
            }
        }

        Err(ZipError::bad_zip("End of Central Directory signature not found"))
    }

    /// Read the archive comment that trails the EOCD record.
    fn read_comment(&self, eocd: &EndOfCentralDirectory, eocd_offset: u64) -> Result<String> {
        let start = eocd_offset + EndOfCentralDirectory::SIZE as u64;
        let mut cursor = ByteCursor::window(&self.reader, start, self.size);
        let bytes = cursor.read_vec(eocd.comment_len as u64)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read and validate the whole Central Directory.
    ///
    /// # Errors
    ///
    /// `BadZipFile` when the EOCD is missing, a record signature is wrong,
    /// the declared entry count does not match the records found within the
    /// declared size, an entry uses an unsupported method or strong
    /// encryption, or entry data ranges overlap or run into the directory.
    pub fn read_central_directory(&self) -> Result<CentralDirectory> {
        let (eocd, eocd_offset) = self.find_eocd()?;

        if eocd.is_zip64() {
            return Err(ZipError::bad_zip("ZIP64 archives are not supported"));
        }
        if eocd.is_multi_disk() {
            return Err(ZipError::bad_zip("multi-volume archives are not supported"));
        }

        let cd_offset = eocd.cd_offset as u64;
        let cd_size = eocd.cd_size as u64;
        if cd_offset + cd_size > eocd_offset {
            return Err(ZipError::bad_zip(format!(
                "Central Directory ({cd_size} bytes at {cd_offset}) overlaps the EOCD at {eocd_offset}"
            )));
        }

        let comment = self.read_comment(&eocd, eocd_offset)?;

        // Read the entire Central Directory in one go
        let cd_data = ByteCursor::window(&self.reader, cd_offset, cd_offset + cd_size)
            .read_vec(cd_size)?;

        // Parse records until the declared size is used up
        let mut entries = Vec::with_capacity(eocd.total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());
        while cursor.position() < cd_size {
            let entry = Self::parse_cdfh(&mut cursor).map_err(|e| match e {
                ZipError::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    ZipError::bad_zip(format!(
                        "Central Directory record {} is truncated",
                        entries.len()
                    ))
                }
                other => other,
            })?;
            log::trace!(
                "entry {}: '{}' {:?} {} -> {} bytes at {}",
                entries.len(),
                entry.file_name,
                entry.compression_method,
                entry.compressed_size,
                entry.uncompressed_size,
                entry.lfh_offset
            );
            entries.push(entry);
        }

        if entries.len() != eocd.total_entries as usize {
            return Err(ZipError::bad_zip(format!(
                "EOCD declares {} entries but the Central Directory holds {}",
                eocd.total_entries,
                entries.len()
            )));
        }

        self.validate_layout(&entries, cd_offset)?;

        log::debug!(
            "central directory: {} entries, {} bytes at offset {}",
            entries.len(),
            cd_size,
            cd_offset
        );

        Ok(CentralDirectory {
            entries,
            comment,
            cd_offset,
            cd_size,
        })
    }

    /// Parse a Central Directory File Header from a cursor.
    ///
    /// The CDFH contains metadata about a file in the archive, including
    /// its name, sizes, and location of the actual file data.
    fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
        // Read and verify the signature (PK\x01\x02)
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            return Err(ZipError::bad_zip(format!(
                "invalid Central Directory File Header signature at offset {}",
                cursor.position() - 4
            )));
        }

        // Read fixed-size header fields
        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        // Read the variable-length file name
        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes)?;
        let raw_name = match String::from_utf8(file_name_bytes) {
            Ok(name) => name,
            Err(e) => {
                let name = String::from_utf8_lossy(e.as_bytes()).into_owned();
                log::warn!("entry name is not valid UTF-8, using '{name}'");
                name
            }
        };

        // Skip the extra field and file comment; the sizes above are
        // authoritative without ZIP64.
        let skip = extra_field_length as u64 + file_comment_length as u64;
        if cursor.position() + skip > cursor.get_ref().len() as u64 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        cursor.set_position(cursor.position() + skip);

        let (file_name, is_directory) = normalize_entry_path(&raw_name)?;

        if flags & FLAG_STRONG_ENCRYPTION != 0 {
            return Err(ZipError::bad_zip(format!(
                "'{file_name}' uses strong encryption, which is not supported"
            )));
        }

        let compression_method = CompressionMethod::from_u16(compression_method);
        if !compression_method.is_supported() {
            return Err(ZipError::bad_zip(format!(
                "'{file_name}' uses unsupported compression method {}",
                compression_method.as_u16()
            )));
        }

        Ok(ZipFileEntry {
            file_name,
            compression_method,
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            flags,
            modified: DosDateTime::from_msdos(last_mod_date, last_mod_time),
            is_directory,
        })
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header (LFH) has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry.
    /// This method reads the LFH to calculate where the actual file
    /// data begins.
    ///
    /// # Errors
    ///
    /// Returns `BadZipFile` if the LFH is invalid.
    pub fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        // Read the Local File Header
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.reader.read_exact_at(entry.lfh_offset, &mut lfh_buf)?;

        // Verify LFH signature (PK\x03\x04)
        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(ZipError::bad_zip(format!(
                "invalid Local File Header for '{}' at offset {}",
                entry.file_name, entry.lfh_offset
            )));
        }

        // Read the variable field lengths from fixed positions in LFH
        let file_name_length = u16::from_le_bytes([lfh_buf[26], lfh_buf[27]]) as u64;
        let extra_field_length = u16::from_le_bytes([lfh_buf[28], lfh_buf[29]]) as u64;

        // Data starts after: LFH (30 bytes) + filename + extra field
        Ok(entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }

    /// Read an entry's raw (possibly encrypted, possibly compressed) bytes.
    ///
    /// `data_end` is the first byte the entry may not reach, normally the
    /// Central Directory offset.
    pub fn read_entry_data(&self, entry: &ZipFileEntry, data_end: u64) -> Result<Vec<u8>> {
        let data_offset = self.get_data_offset(entry)?;
        if data_offset + entry.compressed_size > data_end {
            return Err(ZipError::bad_zip(format!(
                "data of '{}' runs past the end of the entry area",
                entry.file_name
            )));
        }

        let mut cursor = ByteCursor::window(&self.reader, data_offset, data_end);
        Ok(cursor.read_vec(entry.compressed_size)?)
    }

    /// Every entry's local header, name, extra field and data must fit below
    /// the Central Directory, and no two entries may share bytes.
    ///
    /// Spans end at the real data offset read from each Local File Header,
    /// so a local name or extra field longer than the Central Directory's
    /// copy is accounted for.
    fn validate_layout(&self, entries: &[ZipFileEntry], cd_offset: u64) -> Result<()> {
        let mut spans: Vec<(u64, u64, &str)> = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.lfh_offset + LFH_SIZE as u64 > cd_offset {
                return Err(ZipError::bad_zip(format!(
                    "local header of '{}' lies outside the entry area",
                    entry.file_name
                )));
            }
            let data_offset = self.get_data_offset(entry)?;
            spans.push((
                entry.lfh_offset,
                data_offset + entry.compressed_size,
                entry.file_name.as_str(),
            ));
        }
        spans.sort_unstable_by_key(|&(start, _, _)| start);

        for window in spans.windows(2) {
            let (_, end, name) = window[0];
            let (next_start, _, next_name) = window[1];
            if end > next_start {
                return Err(ZipError::bad_zip(format!(
                    "entries '{name}' and '{next_name}' overlap"
                )));
            }
        }

        if let Some(&(_, end, name)) = spans.iter().max_by_key(|&&(_, end, _)| end) {
            if end > cd_offset {
                return Err(ZipError::bad_zip(format!(
                    "data of '{name}' runs into the Central Directory"
                )));
            }
        }

        Ok(())
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Total size of the archive in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Whether the Central Directory an EOCD points at ends before the EOCD.
fn directory_fits(eocd: &EndOfCentralDirectory, eocd_offset: u64) -> bool {
    eocd.cd_offset as u64 + eocd.cd_size as u64 <= eocd_offset
}
