use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::io::{Cursor, Write};

use crate::error::{Result, ZipError};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, CompressionMethod::Unknown(_))
    }
}

/// General purpose bit 0: entry data is encrypted.
pub const FLAG_ENCRYPTED: u16 = 1 << 0;
/// General purpose bit 3: sizes and CRC follow the data in a data descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// General purpose bit 6: strong (non-traditional) encryption.
pub const FLAG_STRONG_ENCRYPTION: u16 = 1 << 6;
/// General purpose bit 11: file name is UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;

/// Version needed to extract deflate and traditional encryption (2.0).
pub const VERSION_NEEDED: u16 = 20;

/// MS-DOS directory attribute, stored in the external attributes.
pub const DOS_DIRECTORY_ATTR: u32 = 0x10;

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipError::bad_zip("invalid End of Central Directory"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Any field saturated to its maximum means the real value lives in a
    /// ZIP64 record.
    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }

    pub fn is_multi_disk(&self) -> bool {
        self.disk_number != 0 || self.disk_with_cd != 0 || self.disk_entries != self.total_entries
    }

    /// Write the record followed by `comment`.
    pub fn write_to<W: Write>(&self, w: &mut W, comment: &[u8]) -> Result<()> {
        w.write_all(Self::SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.disk_number)?;
        w.write_u16::<LittleEndian>(self.disk_with_cd)?;
        w.write_u16::<LittleEndian>(self.disk_entries)?;
        w.write_u16::<LittleEndian>(self.total_entries)?;
        w.write_u32::<LittleEndian>(self.cd_size)?;
        w.write_u32::<LittleEndian>(self.cd_offset)?;
        w.write_u16::<LittleEndian>(comment.len() as u16)?;
        w.write_all(comment)?;
        Ok(())
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Packed MS-DOS date and time, as stored in ZIP headers.
///
/// Two-second resolution, years 1980 through 2107.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DosDateTime {
    pub date: u16,
    pub time: u16,
}

impl DosDateTime {
    pub const fn from_msdos(date: u16, time: u16) -> Self {
        Self { date, time }
    }

    pub fn year(&self) -> u16 {
        ((self.date >> 9) & 0x7F) + 1980
    }

    pub fn month(&self) -> u8 {
        ((self.date >> 5) & 0x0F) as u8
    }

    pub fn day(&self) -> u8 {
        (self.date & 0x1F) as u8
    }

    pub fn hour(&self) -> u8 {
        ((self.time >> 11) & 0x1F) as u8
    }

    pub fn minute(&self) -> u8 {
        ((self.time >> 5) & 0x3F) as u8
    }

    pub fn second(&self) -> u8 {
        ((self.time & 0x1F) * 2) as u8
    }

    /// Convert to a calendar timestamp, or `None` if the packed fields do
    /// not name a real date and time.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year() as i32, self.month() as u32, self.day() as u32)?
            .and_hms_opt(
                self.hour() as u32,
                self.minute() as u32,
                self.second() as u32,
            )
    }

    /// Pack a calendar timestamp. Out-of-range years clamp to the
    /// representable span; odd seconds round down.
    pub fn from_naive(dt: &NaiveDateTime) -> Self {
        if dt.year() < 1980 {
            return Self::from_msdos((1 << 5) | 1, 0);
        }
        if dt.year() > 2107 {
            return Self::from_msdos((127 << 9) | (12 << 5) | 31, (23 << 11) | (59 << 5) | 29);
        }
        let date = (((dt.year() - 1980) as u16) << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
        let time = ((dt.hour() as u16) << 11)
            | ((dt.minute() as u16) << 5)
            | (dt.second().min(59) as u16 / 2);
        Self::from_msdos(date, time)
    }
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipFileEntry {
    /// Normalized path: no leading slash, no trailing slash for directories.
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub flags: u16,
    pub modified: DosDateTime,
    pub is_directory: bool,
}

impl ZipFileEntry {
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    pub fn uses_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.file_name.rsplit('/').next().unwrap_or(&self.file_name)
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        (self.modified.year(), self.modified.month(), self.modified.day())
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        (
            self.modified.hour(),
            self.modified.minute(),
            self.modified.second(),
        )
    }

    /// The name as stored on disk: directories carry a trailing slash.
    fn stored_name(&self) -> String {
        if self.is_directory {
            format!("{}/", self.file_name)
        } else {
            self.file_name.clone()
        }
    }

    /// Write the local file header. Sizes and CRC are known up front, so no
    /// data descriptor follows.
    pub fn write_local_header<W: Write>(&self, w: &mut W) -> Result<()> {
        let name = self.stored_name();
        w.write_all(LFH_SIGNATURE)?;
        w.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        w.write_u16::<LittleEndian>(self.modified.time)?;
        w.write_u16::<LittleEndian>(self.modified.date)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u32::<LittleEndian>(self.compressed_size as u32)?;
        w.write_u32::<LittleEndian>(self.uncompressed_size as u32)?;
        w.write_u16::<LittleEndian>(name.len() as u16)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_all(name.as_bytes())?;
        Ok(())
    }

    /// Write this entry's Central Directory record.
    pub fn write_central_header<W: Write>(&self, w: &mut W) -> Result<()> {
        let name = self.stored_name();
        let external_attrs = if self.is_directory {
            DOS_DIRECTORY_ATTR
        } else {
            0
        };
        w.write_all(CDFH_SIGNATURE)?;
        w.write_u16::<LittleEndian>(VERSION_NEEDED)?; // made by: MS-DOS, 2.0
        w.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        w.write_u16::<LittleEndian>(self.modified.time)?;
        w.write_u16::<LittleEndian>(self.modified.date)?;
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u32::<LittleEndian>(self.compressed_size as u32)?;
        w.write_u32::<LittleEndian>(self.uncompressed_size as u32)?;
        w.write_u16::<LittleEndian>(name.len() as u16)?;
        w.write_u16::<LittleEndian>(0)?; // extra field
        w.write_u16::<LittleEndian>(0)?; // file comment
        w.write_u16::<LittleEndian>(0)?; // disk number start
        w.write_u16::<LittleEndian>(0)?; // internal attributes
        w.write_u32::<LittleEndian>(external_attrs)?;
        w.write_u32::<LittleEndian>(self.lfh_offset as u32)?;
        w.write_all(name.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dos_datetime_fields() {
        // 2014-07-21 13:45:30
        let dt = DosDateTime::from_msdos((34 << 9) | (7 << 5) | 21, (13 << 11) | (45 << 5) | 15);
        assert_eq!(dt.year(), 2014);
        assert_eq!(dt.month(), 7);
        assert_eq!(dt.day(), 21);
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (13, 45, 30));

        let naive = dt.to_naive().unwrap();
        assert_eq!(naive.to_string(), "2014-07-21 13:45:30");
        assert_eq!(DosDateTime::from_naive(&naive), dt);
    }

    #[test]
    fn test_dos_datetime_invalid_and_clamped() {
        assert_eq!(DosDateTime::default().to_naive(), None);

        let old = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let packed = DosDateTime::from_naive(&old);
        assert_eq!(packed.to_naive().unwrap().to_string(), "1980-01-01 00:00:00");

        let odd = NaiveDate::from_ymd_opt(2020, 2, 29)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        assert_eq!(DosDateTime::from_naive(&odd).second(), 58);
    }

    #[test]
    fn test_eocd_write_then_parse() {
        let eocd = EndOfCentralDirectory {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: 2,
            total_entries: 2,
            cd_size: 100,
            cd_offset: 400,
            comment_len: 0,
        };
        let mut buf = Vec::new();
        eocd.write_to(&mut buf, b"hi").unwrap();
        assert_eq!(buf.len(), EndOfCentralDirectory::SIZE + 2);

        let parsed = EndOfCentralDirectory::from_bytes(&buf).unwrap();
        assert_eq!(parsed.comment_len, 2);
        assert_eq!(parsed.cd_offset, 400);
        assert!(!parsed.is_zip64());
        assert!(!parsed.is_multi_disk());
    }

    #[test]
    fn test_local_header_layout() {
        let entry = ZipFileEntry {
            file_name: "dir".to_string(),
            compression_method: CompressionMethod::Stored,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: 0,
            flags: 0,
            modified: DosDateTime::default(),
            is_directory: true,
        };
        let mut buf = Vec::new();
        entry.write_local_header(&mut buf).unwrap();
        assert_eq!(&buf[0..4], LFH_SIGNATURE);
        assert_eq!(buf.len(), LFH_SIZE + 4);
        assert_eq!(&buf[LFH_SIZE..], b"dir/");
        assert_eq!(entry.name(), "dir");
    }
}
