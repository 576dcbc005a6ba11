//! Temporary-file cleanup that also runs when the user hits Ctrl-C
//!
//! Normal exits remove temporary archives through `Drop`. The Ctrl-C handler
//! exits the process directly, so it purges whatever is still registered here
//! first.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Clone, Default)]
pub struct CleanupRegistry {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `path` until the returned guard is dropped
    pub fn register(&self, path: &Path) -> CleanupGuard {
        self.paths.lock().push(path.to_path_buf());
        CleanupGuard {
            registry: self.clone(),
            path: path.to_path_buf(),
        }
    }

    pub fn pending(&self) -> Vec<PathBuf> {
        self.paths.lock().clone()
    }

    /// Remove every registered file; returns how many were deleted
    pub fn purge(&self) -> usize {
        let paths: Vec<PathBuf> = self.paths.lock().drain(..).collect();
        paths
            .iter()
            .filter(|p| std::fs::remove_file(p).is_ok())
            .count()
    }
}

pub struct CleanupGuard {
    registry: CleanupRegistry,
    path: PathBuf,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let mut paths = self.registry.paths.lock();
        if let Some(pos) = paths.iter().position(|p| p == &self.path) {
            paths.remove(pos);
        }
    }
}

/// Ctrl-C: purge temporary archives, restore the terminal, exit with 130
pub fn install_interrupt_handler(registry: CleanupRegistry) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        let _ = crossterm::terminal::disable_raw_mode();
        registry.purge();
        eprintln!("\nInterrupted");
        // 128 + SIGINT
        std::process::exit(INTERRUPTED_EXIT_CODE);
    })?;
    Ok(())
}
