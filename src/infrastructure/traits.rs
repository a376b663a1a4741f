//! I/O boundary traits for testability
//!
//! These traits abstract external I/O and user-facing feedback, allowing services
//! to be tested with mock implementations.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Check if path is a file.
    fn is_file(&self, path: &Path) -> bool;
}

/// Receives matching progress as a fraction in `0.0..=1.0`.
///
/// Called concurrently from worker threads.
pub trait ProgressSink: Send + Sync {
    fn report(&self, fraction: f32);
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Discards progress.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _fraction: f32) {}
}

/// Logs progress at info level whenever another 10% step is crossed.
#[derive(Debug, Default)]
pub struct LogProgress {
    last_step: AtomicUsize,
}

impl ProgressSink for LogProgress {
    fn report(&self, fraction: f32) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let step = (fraction.clamp(0.0, 1.0) * 10.0).floor() as usize;
        let previous = self.last_step.fetch_max(step, Ordering::Relaxed);
        if step > previous {
            info!("Matching: {}%", step * 10);
        }
    }
}
