//! Retention cleanup run before every logger initialization.
//!
//! A [`RetentionCleaner`] receives the log root and deletes whatever its
//! policy considers expired. It never fails: problems are collected into the
//! returned [`CleanupReport`] and logged once the new sinks are attached.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use thiserror::Error;
use tracing::{debug, warn};

/// Default age after which a log file is deleted.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(16 * 24 * 60 * 60);

/// Deletes expired log data under a root directory.
pub trait RetentionCleaner: Send + Sync {
    /// Cleans `root`. A missing root is not an error.
    fn clean(&self, root: &Path) -> CleanupReport;
}

#[derive(Debug, Error)]
#[error("failed to clean {}: {source}", .path.display())]
pub struct RetentionError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Outcome of one cleanup pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed_files: Vec<PathBuf>,
    pub removed_dirs: Vec<PathBuf>,
    pub errors: Vec<RetentionError>,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.removed_files.is_empty() && self.removed_dirs.is_empty() && self.errors.is_empty()
    }

    fn fail(&mut self, path: &Path, source: io::Error) {
        self.errors.push(RetentionError {
            path: path.to_path_buf(),
            source,
        });
    }

    /// Emits the report through the current dispatcher.
    pub(crate) fn log(&self) {
        if !self.removed_files.is_empty() || !self.removed_dirs.is_empty() {
            debug!(
                files = self.removed_files.len(),
                dirs = self.removed_dirs.len(),
                "retention cleanup removed expired logs"
            );
        }
        for err in &self.errors {
            warn!(path = %err.path.display(), error = %err.source, "retention cleanup failed");
        }
    }
}

/// Skips cleanup entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetention;

impl RetentionCleaner for NoRetention {
    fn clean(&self, _root: &Path) -> CleanupReport {
        CleanupReport::default()
    }
}

/// Deletes log files older than `max_age`, then every directory emptied by
/// those deletions. Directories that were already empty are left alone, the
/// root itself is kept and symlinks are never followed.
#[derive(Clone)]
pub struct AgeRetention {
    max_age: Duration,
    extension: String,
}

impl AgeRetention {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            extension: "log".to_string(),
        }
    }

    /// Restricts deletion to files with this extension (default `log`).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    #[inline]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn is_expired(&self, path: &Path, modified: SystemTime, now: SystemTime) -> bool {
        let matches = path
            .extension()
            .is_some_and(|ext| ext == self.extension.as_str());
        // Future mtimes (clock skew) count as fresh.
        matches
            && now
                .duration_since(modified)
                .is_ok_and(|age| age > self.max_age)
    }

    /// Returns `true` if this pass removed entries from `dir` and left it empty.
    fn sweep(&self, dir: &Path, now: SystemTime, report: &mut CleanupReport) -> bool {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                report.fail(dir, e);
                return false;
            }
        };

        let mut empty = true;
        let mut removed = false;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report.fail(dir, e);
                    empty = false;
                    continue;
                }
            };
            let path = entry.path();
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    report.fail(&path, e);
                    empty = false;
                    continue;
                }
            };

            if meta.is_dir() {
                if !self.sweep(&path, now, report) {
                    empty = false;
                    continue;
                }
                match fs::remove_dir(&path) {
                    Ok(()) => {
                        report.removed_dirs.push(path);
                        removed = true;
                    }
                    Err(e) => {
                        report.fail(&path, e);
                        empty = false;
                    }
                }
                continue;
            }

            let expired = meta.is_file()
                && meta
                    .modified()
                    .is_ok_and(|modified| self.is_expired(&path, modified, now));
            if !expired {
                empty = false;
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    report.removed_files.push(path);
                    removed = true;
                }
                Err(e) => {
                    report.fail(&path, e);
                    empty = false;
                }
            }
        }
        empty && removed
    }
}

impl Default for AgeRetention {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl fmt::Debug for AgeRetention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgeRetention")
            .field("max_age", &self.max_age)
            .field("extension", &self.extension)
            .finish()
    }
}

impl RetentionCleaner for AgeRetention {
    fn clean(&self, root: &Path) -> CleanupReport {
        let mut report = CleanupReport::default();
        match fs::symlink_metadata(root) {
            Ok(meta) if meta.is_dir() => {
                self.sweep(root, SystemTime::now(), &mut report);
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => report.fail(root, e),
        }
        report
    }
}
