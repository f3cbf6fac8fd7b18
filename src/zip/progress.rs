//! Progress notifications for whole-archive extraction.
//!
//! Observers are called synchronously from the extraction loop and cannot
//! influence it. Progress is the fraction of entries processed, not bytes.

use std::sync::mpsc::Sender;

/// Receives extraction progress. All methods default to no-ops.
pub trait UnzipObserver {
    /// Called once before the first entry, with the archive name.
    fn will_begin(&mut self, archive_name: &str) {
        let _ = archive_name;
    }

    /// Called with a fraction in `[0.0, 1.0]` at the start, after every
    /// entry (with that entry's path), and at the end.
    fn update_progress(&mut self, progress: f64, file_name: &str) {
        let _ = (progress, file_name);
    }

    /// Called once after the last entry, with the archive name.
    fn did_end(&mut self, archive_name: &str) {
        let _ = archive_name;
    }
}

/// Progress as a message, for observers that live on another thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Begin(String),
    Progress(f64, String),
    End(String),
}

/// Forward events over a channel. A dropped receiver is ignored.
impl UnzipObserver for Sender<ProgressEvent> {
    fn will_begin(&mut self, archive_name: &str) {
        let _ = self.send(ProgressEvent::Begin(archive_name.to_string()));
    }

    fn update_progress(&mut self, progress: f64, file_name: &str) {
        let _ = self.send(ProgressEvent::Progress(progress, file_name.to_string()));
    }

    fn did_end(&mut self, archive_name: &str) {
        let _ = self.send(ProgressEvent::End(archive_name.to_string()));
    }
}

/// Fraction of `total` entries done, `1.0` for an empty archive.
pub(crate) fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        (done as f64 / total as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_fraction() {
        assert_eq!(fraction(0, 4), 0.0);
        assert_eq!(fraction(1, 4), 0.25);
        assert_eq!(fraction(4, 4), 1.0);
        assert_eq!(fraction(0, 0), 1.0);
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (mut tx, rx) = mpsc::channel();
        tx.will_begin("a.zip");
        assert_eq!(rx.recv().unwrap(), ProgressEvent::Begin("a.zip".into()));
        drop(rx);
        tx.update_progress(0.5, "x");
        tx.did_end("a.zip");
    }
}
