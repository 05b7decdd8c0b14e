/// Trait for reporting pipeline progress.
///
/// The CLI implements it with indicatif bars; the worker and tests use
/// [`SilentReporter`]. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_gather_complete(&self, _total_files: usize) {}
    fn on_fingerprint_start(&self, _total_files: usize) {}
    fn on_fingerprint_progress(&self, _files_done: usize, _total_files: usize) {}
    fn on_fingerprint_complete(&self, _rankable: usize, _duration_secs: f64) {}
    fn on_compare_start(&self, _fingerprints: usize) {}
    fn on_compare_complete(&self, _pairs: usize, _groups: usize, _duration_secs: f64) {}
    fn on_persist_start(&self) {}
    fn on_persist_complete(&self, _rows: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
