//! The Read/Write/Closed state machine of the archive handle.

mod common;

use common::{build_archive, err_kind, open_bytes};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use zipcodec::{ArchiveMode, CompressionLevel, ErrorKind, WriteOptions, ZipArchive};

/// A sink the test can still look at after the archive owns it.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_extraction_on_write_handle() {
    let mut archive = ZipArchive::create_sink(SharedSink::default(), "w.zip", WriteOptions::new());
    archive.add_file("a.txt", b"a").unwrap();

    assert_eq!(err_kind(archive.entries()), ErrorKind::WrongArchiveMode);
    assert_eq!(err_kind(archive.tree()), ErrorKind::WrongArchiveMode);
    assert_eq!(err_kind(archive.unzip_file_at_index(0)), ErrorKind::WrongArchiveMode);
    assert_eq!(err_kind(archive.offset_at_index(0)), ErrorKind::WrongArchiveMode);
    assert_eq!(err_kind(archive.index_of_file_offset(0)), ErrorKind::WrongArchiveMode);
    assert_eq!(err_kind(archive.files()), ErrorKind::WrongArchiveMode);
    assert_eq!(err_kind(archive.set_password(Some("pw"))), ErrorKind::WrongArchiveMode);

    // The failed calls left the handle writable.
    assert_eq!(archive.mode(), ArchiveMode::Write);
    archive.add_file("b.txt", b"b").unwrap();
    assert_eq!(archive.file_count().unwrap(), 2);
}

#[test]
fn test_append_on_read_handle() {
    let mut archive = open_bytes(build_archive(WriteOptions::new(), &[("a.txt", b"a")]), None);

    assert_eq!(err_kind(archive.add_file("b.txt", b"b")), ErrorKind::WrongArchiveMode);
    assert_eq!(err_kind(archive.add_directory("d")), ErrorKind::WrongArchiveMode);
    assert_eq!(
        err_kind(archive.zip_file_path(".", CompressionLevel::Default)),
        ErrorKind::WrongArchiveMode
    );

    assert_eq!(archive.mode(), ArchiveMode::Read);
    assert_eq!(archive.file_count().unwrap(), 1);
}

#[test]
fn test_closed_handle_rejects_everything() {
    let mut archive = open_bytes(build_archive(WriteOptions::new(), &[("a.txt", b"a")]), None);
    assert_eq!(archive.close().unwrap(), None);
    assert_eq!(archive.mode(), ArchiveMode::Closed);
    assert!(!archive.is_opened());

    assert_eq!(err_kind(archive.file_count()), ErrorKind::FileIsNotOpened);
    assert_eq!(err_kind(archive.comment()), ErrorKind::FileIsNotOpened);
    assert_eq!(err_kind(archive.encrypted()), ErrorKind::FileIsNotOpened);
    assert_eq!(err_kind(archive.entries()), ErrorKind::FileIsNotOpened);
    assert_eq!(err_kind(archive.unzip_file_at_index(0)), ErrorKind::FileIsNotOpened);
    assert_eq!(err_kind(archive.files()), ErrorKind::FileIsNotOpened);
    assert_eq!(err_kind(archive.add_file("b.txt", b"b")), ErrorKind::FileIsNotOpened);

    // Closing twice is harmless.
    assert_eq!(archive.close().unwrap(), None);
}

#[test]
fn test_close_finalizes_sink() {
    let sink = SharedSink::default();
    let mut archive = ZipArchive::create_sink(
        sink.clone(),
        "w.zip",
        WriteOptions::new().comment("closing time"),
    );
    archive.add_file("a.txt", b"a").unwrap();
    assert_eq!(archive.comment().unwrap(), "closing time");
    let summary = archive.close().unwrap().unwrap();

    let bytes = sink.0.lock().unwrap().clone();
    assert_eq!(summary.bytes_written, bytes.len() as u64);
    let reopened = open_bytes(bytes, None);
    assert_eq!(reopened.comment().unwrap(), "closing time");
    assert_eq!(err_kind(archive.add_file("b.txt", b"b")), ErrorKind::FileIsNotOpened);
}

#[test]
fn test_dropping_write_handle_finalizes() {
    let sink = SharedSink::default();
    {
        let mut archive = ZipArchive::create_sink(sink.clone(), "w.zip", WriteOptions::new());
        archive.add_file("a.txt", b"dropped").unwrap();
    }
    let archive = open_bytes(sink.0.lock().unwrap().clone(), None);
    let entry = archive.unzip_file_at_index(0).unwrap();
    assert_eq!(entry.data.as_deref(), Some(&b"dropped"[..]));
}

#[test]
fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nowhere.zip");
    assert_eq!(err_kind(ZipArchive::open(&missing, None)), ErrorKind::FileIsNotExist);
}

#[test]
fn test_create_respects_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exists.zip");
    std::fs::write(&path, b"not yet a zip").unwrap();

    assert_eq!(
        err_kind(ZipArchive::create(&path, WriteOptions::new(), false)),
        ErrorKind::FileOpen
    );
    assert_eq!(std::fs::read(&path).unwrap(), b"not yet a zip");

    let mut archive = ZipArchive::create(&path, WriteOptions::new(), true).unwrap();
    archive.add_file("a.txt", b"a").unwrap();
    archive.close().unwrap();
    assert_eq!(ZipArchive::open(&path, None).unwrap().file_count().unwrap(), 1);
}

#[test]
fn test_create_in_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no/such/dir/out.zip");
    assert_eq!(
        err_kind(ZipArchive::create(&path, WriteOptions::new(), true)),
        ErrorKind::FileOpen
    );
}

#[test]
fn test_empty_archive_with_required_entries_fails_close() {
    let mut archive = ZipArchive::create_sink(
        SharedSink::default(),
        "w.zip",
        WriteOptions::new().require_entries(true),
    );
    assert_eq!(err_kind(archive.close()), ErrorKind::InternalError);
    assert_eq!(archive.mode(), ArchiveMode::Write);

    archive.add_directory("now-not-empty").unwrap();
    assert!(archive.close().unwrap().is_some());
}
