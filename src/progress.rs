//! Per-chunk progress display
//!
//! The transfer loop calls [`ProgressReporter::report`] after every accepted
//! chunk. Reporters are pure sinks: nothing flows back into the transfer.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};

pub trait ProgressReporter {
    fn report(&self, _completed: usize, _total: usize) {}
    fn finish(&self) {}
}

/// Reporter that prints nothing; swapping it in changes no transfer behavior
pub struct NoopReporter;
impl ProgressReporter for NoopReporter {}

/// Completion percentage rounded to one decimal. `total == 0` counts as done.
pub fn percent(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let p = completed.min(total) as f64 * 100.0 / total as f64;
    (p * 10.0).round() / 10.0
}

/// Progress bar over chunks (interactive terminals)
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new(total_chunks: usize) -> Self {
        let bar = ProgressBar::new(total_chunks as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] chunk {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }
}

impl ProgressReporter for BarReporter {
    fn report(&self, completed: usize, total: usize) {
        if self.bar.length() != Some(total as u64) {
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(completed as u64);
        self.bar.set_message(format!("{:.1}%", percent(completed, total)));
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Single rewritten console line: `Uploading chunk i/n: p%`
pub struct LineReporter;

impl ProgressReporter for LineReporter {
    fn report(&self, completed: usize, total: usize) {
        print!(
            "\rUploading chunk {}/{}: {:.1}%   ",
            completed,
            total,
            percent(completed, total)
        );
        let _ = io::stdout().flush();
    }

    fn finish(&self) {
        print!("\r{:40}\r", "");
        let _ = io::stdout().flush();
    }
}
