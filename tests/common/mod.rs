//! Shared helpers for the integration tests.
//!
//! Each file under `tests/` is its own crate and uses a different subset
//! of these, hence the `dead_code` allowance.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use zipcodec::{WriteOptions, ZipArchive, ZipFileEntry, ZipWriter};

/// A fixed, even-second timestamp that survives the MS-DOS round trip.
pub fn fixed_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 5)
        .and_then(|d| d.and_hms_opt(10, 20, 30))
        .expect("valid date")
}

/// Build an in-memory archive from `(path, data)` pairs.
///
/// Paths ending in `/` become directory entries.
pub fn build_archive(options: WriteOptions, entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Vec::new(), options);
    for (path, data) in entries {
        if let Some(dir) = path.strip_suffix('/') {
            writer
                .add_directory_at(dir, fixed_time())
                .expect("add directory");
        } else {
            writer
                .add_file_at(path, data, fixed_time())
                .expect("add file");
        }
    }
    writer.finish().expect("finish archive");
    writer.into_inner().expect("finalized sink")
}

/// Open archive bytes through the public handle.
pub fn open_bytes(bytes: Vec<u8>, password: Option<&str>) -> ZipArchive {
    ZipArchive::open_source(bytes, "test.zip", password).expect("open archive")
}

/// Offset of the first data byte of `entry`, assuming no extra field.
pub fn data_offset(entry: &ZipFileEntry) -> usize {
    let stored_len = entry.file_name.len() + usize::from(entry.is_directory);
    entry.lfh_offset as usize + 30 + stored_len
}

/// The kind of error `result` failed with. Panics on success.
pub fn err_kind<T>(result: zipcodec::Result<T>) -> zipcodec::ErrorKind {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(e) => e.kind(),
    }
}
