use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use vid_duper_core::ProgressReporter;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Fingerprint phase: progress bar (file count known from gathering)
/// - Compare and persist phases: spinner
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn spinner(&self, message: &'static str) {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(TICK_CHARS);
        pb.set_style(style);
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }
}

fn done(message: String) {
    eprintln!("  {} {}", "✓".green(), message);
}

impl ProgressReporter for CliReporter {
    fn on_gather_complete(&self, total_files: usize) {
        done(format!("Found {} candidate videos", total_files));
    }

    fn on_fingerprint_start(&self, total_files: usize) {
        let pb = ProgressBar::new(total_files as u64);
        let style = ProgressStyle::with_template(
            "  {spinner:.cyan} Fingerprinting [{bar:30.cyan/dim}] {pos}/{len} videos ({eta} remaining)",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─")
        .tick_chars(TICK_CHARS);
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_fingerprint_progress(&self, files_done: usize, total_files: usize) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                if pb.length() != Some(total_files as u64) {
                    pb.set_length(total_files as u64);
                }
                pb.set_position(files_done as u64);
            }
        }
    }

    fn on_fingerprint_complete(&self, rankable: usize, duration_secs: f64) {
        self.finish_bar();
        done(format!(
            "Fingerprints complete: {} usable in {:.2}s",
            rankable, duration_secs
        ));
    }

    fn on_compare_start(&self, _fingerprints: usize) {
        self.spinner("Comparing fingerprints...");
    }

    fn on_compare_complete(&self, pairs: usize, groups: usize, duration_secs: f64) {
        self.finish_bar();
        done(format!(
            "Compare complete: {} pairs, {} groups in {:.2}s",
            pairs, groups, duration_secs
        ));
    }

    fn on_persist_start(&self) {
        self.spinner("Writing results to database...");
    }

    fn on_persist_complete(&self, rows: usize, duration_secs: f64) {
        self.finish_bar();
        done(format!(
            "Database write complete: {} records in {:.2}s",
            rows, duration_secs
        ));
    }
}
