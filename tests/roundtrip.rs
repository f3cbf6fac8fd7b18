//! Write-then-read tests through the public archive handle.

mod common;

use common::{build_archive, fixed_time, open_bytes};
use zipcodec::zip::CompressionMethod;
use zipcodec::{ArchiveMode, CompressionLevel, WriteOptions, ZipArchive};

#[test]
fn test_single_file_end_to_end() {
    let bytes = build_archive(WriteOptions::new(), &[("readme.txt", b"hello")]);
    let archive = open_bytes(bytes, None);

    assert_eq!(archive.mode(), ArchiveMode::Read);
    assert_eq!(archive.file_count().unwrap(), 1);
    assert!(!archive.encrypted().unwrap());

    let entry = archive.unzip_file_at_index(0).unwrap();
    assert_eq!(entry.name, "readme.txt");
    assert_eq!(entry.data.as_deref(), Some(&b"hello"[..]));
    assert!(!entry.is_directory);
    assert!(entry.children.is_empty());
    assert_eq!(entry.modified, Some(fixed_time()));
    assert_eq!(entry.offset, Some(0));
}

#[test]
fn test_stored_crc_matches_crc32fast() {
    let payload = b"The quick brown fox jumps over the lazy dog".repeat(20);
    let bytes = build_archive(WriteOptions::new(), &[("fox.txt", &payload)]);
    let archive = open_bytes(bytes, None);

    let entry = &archive.entries().unwrap()[0];
    assert_eq!(entry.crc32, crc32fast::hash(&payload));
    assert_eq!(entry.uncompressed_size, payload.len() as u64);
    assert_eq!(entry.compression_method, CompressionMethod::Deflate);
    assert!(entry.compressed_size < entry.uncompressed_size);
}

#[test]
fn test_every_level_round_trips() {
    let payload = b"abcabcabcabc 0123456789 ".repeat(64);
    for level in -1..=9 {
        let level = CompressionLevel::try_from(level).unwrap();
        let bytes = build_archive(WriteOptions::new().level(level), &[("data.bin", &payload)]);
        let archive = open_bytes(bytes, None);

        let entry = &archive.entries().unwrap()[0];
        let expected = if level == CompressionLevel::NoCompression {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflate
        };
        assert_eq!(entry.compression_method, expected, "{level:?}");

        let unzipped = archive.unzip_file_at_index(0).unwrap();
        assert_eq!(unzipped.data.as_deref(), Some(payload.as_slice()), "{level:?}");
    }
}

#[test]
fn test_empty_file_and_comment() {
    let bytes = build_archive(
        WriteOptions::new().comment("built by the tests"),
        &[("empty.txt", b"")],
    );
    let archive = open_bytes(bytes, None);

    assert_eq!(archive.comment().unwrap(), "built by the tests");
    let entry = archive.unzip_file_at_index(0).unwrap();
    assert_eq!(entry.data.as_deref(), Some(&b""[..]));
}

#[test]
fn test_unicode_names_survive() {
    let bytes = build_archive(WriteOptions::new(), &[("données/résumé.txt", b"ok")]);
    let archive = open_bytes(bytes, None);

    let entry = &archive.entries().unwrap()[0];
    assert_eq!(entry.file_name, "données/résumé.txt");
    assert_ne!(entry.flags & zipcodec::zip::FLAG_UTF8, 0);
}

#[test]
fn test_offsets_and_indices_are_inverse() {
    let bytes = build_archive(
        WriteOptions::new(),
        &[("a.txt", b"a"), ("dir/", b""), ("dir/b.txt", b"bb"), ("c.txt", b"ccc")],
    );
    let archive = open_bytes(bytes, None);

    for index in 0..archive.file_count().unwrap() {
        let offset = archive.offset_at_index(index).unwrap();
        assert_eq!(archive.index_of_file_offset(offset).unwrap(), index);
    }
    assert!(archive.offset_at_index(4).is_err());
    assert!(archive.index_of_file_offset(1).is_err());
}

#[test]
fn test_unzip_all_in_archive_order() {
    let bytes = build_archive(
        WriteOptions::new(),
        &[("z.txt", b"z"), ("a.txt", b"a"), ("m/", b""), ("m/n.txt", b"n")],
    );
    let mut archive = open_bytes(bytes, None);

    let all = archive.unzip_to_vec().unwrap();
    let names: Vec<_> = all.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["z.txt", "a.txt", "m", "m/n.txt"]);

    // A second pass starts over.
    assert_eq!(archive.files().unwrap().count(), 4);
}

#[test]
fn test_file_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.zip");

    let mut archive = ZipArchive::create(&path, WriteOptions::new(), false).unwrap();
    assert_eq!(archive.mode(), ArchiveMode::Write);
    archive.add_directory("docs").unwrap();
    archive.add_file("docs/readme.txt", b"hello").unwrap();
    assert_eq!(archive.file_count().unwrap(), 2);
    let summary = archive.close().unwrap().unwrap();
    assert_eq!(summary.entries_written, 2);
    assert_eq!(summary.bytes_written, std::fs::metadata(&path).unwrap().len());

    let archive = ZipArchive::open(&path, None).unwrap();
    assert_eq!(archive.name(), "disk.zip");
    assert_eq!(archive.path(), Some(path.as_path()));
    let file = archive.unzip_file_at_index(1).unwrap();
    assert_eq!(file.name, "docs/readme.txt");
    assert_eq!(file.data.as_deref(), Some(&b"hello"[..]));
}

#[test]
fn test_zip_file_path_walks_directories() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("photos");
    std::fs::create_dir_all(input.join("2024")).unwrap();
    std::fs::write(input.join("2024/beach.jpg"), b"jpeg bytes").unwrap();
    std::fs::write(input.join("index.txt"), b"list").unwrap();

    let path = dir.path().join("photos.zip");
    let mut archive = ZipArchive::create(&path, WriteOptions::new(), false).unwrap();
    archive
        .zip_file_path(&input, CompressionLevel::BestSpeed)
        .unwrap();
    archive.close().unwrap();

    let archive = ZipArchive::open(&path, None).unwrap();
    let names: Vec<_> = archive
        .entries()
        .unwrap()
        .iter()
        .map(|e| (e.file_name.as_str(), e.is_directory))
        .collect();
    assert_eq!(
        names,
        [
            ("photos", true),
            ("photos/2024", true),
            ("photos/2024/beach.jpg", false),
            ("photos/index.txt", false),
        ]
    );
    let beach = archive.unzip_file_at_index(2).unwrap();
    assert_eq!(beach.data.as_deref(), Some(&b"jpeg bytes"[..]));
}
