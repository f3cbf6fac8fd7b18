//! The entry tree and whole-archive progress reporting.

mod common;

use common::{build_archive, open_bytes};
use std::sync::{Arc, Mutex, mpsc};
use zipcodec::zip::ProgressEvent;
use zipcodec::{UnzipObserver, WriteOptions};

#[test]
fn test_tree_infers_missing_directories() {
    let bytes = build_archive(
        WriteOptions::new(),
        &[("a/b.txt", b"b"), ("a/c/d.txt", b"d")],
    );
    let archive = open_bytes(bytes, None);
    let tree = archive.tree().unwrap();

    let root = tree.root();
    assert_eq!(root.children().len(), 1);
    let a = root.child("a").unwrap();
    assert!(a.is_directory());
    assert_eq!(a.entry_index(), None);

    let names: Vec<_> = a.children().iter().map(|c| c.name()).collect();
    assert_eq!(names, ["b.txt", "c"]);
    assert_eq!(tree.find("a/c/d.txt").unwrap().entry_index(), Some(1));
    assert!(tree.find("a/missing").is_none());
}

#[test]
fn test_directory_payload_holds_descendants() {
    let bytes = build_archive(
        WriteOptions::new(),
        &[("docs/", b""), ("docs/a.md", b"A"), ("docs/img/x.png", b"X"), ("top.txt", b"T")],
    );
    let archive = open_bytes(bytes, None);

    let docs = archive.unzip_file_at_index(0).unwrap();
    assert!(docs.is_directory);
    assert_eq!(docs.name, "docs");
    assert_eq!(docs.data, None);
    assert_eq!(docs.offset, Some(0));
    assert_eq!(docs.children.len(), 2);

    let a = &docs.children[0];
    assert_eq!(a.name, "docs/a.md");
    assert_eq!(a.data.as_deref(), Some(&b"A"[..]));

    // `docs/img` exists only as a prefix of a file path.
    let img = &docs.children[1];
    assert_eq!(img.name, "docs/img");
    assert!(img.is_directory);
    assert_eq!(img.offset, None);
    assert_eq!(img.modified, None);
    assert_eq!(img.children[0].data.as_deref(), Some(&b"X"[..]));
}

#[test]
fn test_progress_over_channel() {
    let bytes = build_archive(
        WriteOptions::new(),
        &[("one.txt", b"1"), ("two.txt", b"2"), ("three.txt", b"3"), ("four.txt", b"4")],
    );
    let mut archive = open_bytes(bytes, None);
    let (tx, rx) = mpsc::channel();
    archive.set_observer(tx);

    assert_eq!(archive.unzip_to_vec().unwrap().len(), 4);
    archive.clear_observer();

    let events: Vec<_> = rx.iter().collect();
    assert_eq!(events.first(), Some(&ProgressEvent::Begin("test.zip".into())));
    assert_eq!(events.last(), Some(&ProgressEvent::End("test.zip".into())));

    let fractions: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress(p, _) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(fractions, [0.0, 0.25, 0.5, 0.75, 1.0, 1.0]);
    assert!(events.contains(&ProgressEvent::Progress(0.5, "two.txt".into())));
}

#[derive(Default)]
struct Counts {
    begins: usize,
    updates: usize,
    ends: usize,
}

#[derive(Clone, Default)]
struct Counter(Arc<Mutex<Counts>>);

impl UnzipObserver for Counter {
    fn will_begin(&mut self, _: &str) {
        self.0.lock().unwrap().begins += 1;
    }

    fn update_progress(&mut self, progress: f64, _: &str) {
        assert!((0.0..=1.0).contains(&progress));
        self.0.lock().unwrap().updates += 1;
    }

    fn did_end(&mut self, _: &str) {
        self.0.lock().unwrap().ends += 1;
    }
}

#[test]
fn test_empty_archive_progress() {
    let mut archive = open_bytes(build_archive(WriteOptions::new(), &[]), None);
    let counter = Counter::default();
    archive.set_observer(counter.clone());

    assert!(archive.unzip_to_vec().unwrap().is_empty());
    let counts = counter.0.lock().unwrap();
    assert_eq!((counts.begins, counts.updates, counts.ends), (1, 2, 1));
}
