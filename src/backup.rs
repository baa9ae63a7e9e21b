use chrono::{DateTime, Local};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Snapshot failure. Whether this aborts the run is the controller's call.
#[derive(Debug)]
pub struct BackupError(pub String);

impl std::fmt::Display for BackupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "backup failed: {}", self.0)
    }
}

impl std::error::Error for BackupError {}

/// Handle to a completed snapshot
#[derive(Debug, Clone)]
pub struct BackupHandle {
    /// Directory holding the copied tree
    pub path: PathBuf,
    /// When the snapshot started
    pub timestamp: DateTime<Local>,
    /// Number of files copied
    pub files_copied: usize,
}

/// Creates full timestamped copies of the working tree before mutation
pub struct BackupManager {
    backup_dir: PathBuf,
    excludes: GlobSet,
}

impl BackupManager {
    /// Build a manager writing snapshots under `backup_dir` (relative paths
    /// resolve against the snapshot root), skipping paths matching `excludes`.
    pub fn new(backup_dir: impl Into<PathBuf>, excludes: &[String]) -> Result<Self, BackupError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in excludes {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => {
                    warn!("Invalid backup exclude pattern '{}': {}", pattern, e);
                    continue;
                }
            }
        }
        let excludes = builder
            .build()
            .map_err(|e| BackupError(format!("failed to build exclude globset: {}", e)))?;
        Ok(Self {
            backup_dir: backup_dir.into(),
            excludes,
        })
    }

    /// Copy the tree under `root` into a fresh timestamped directory.
    /// The backup directory itself and excluded paths are skipped.
    pub fn snapshot(&self, root: &Path) -> Result<BackupHandle, BackupError> {
        let timestamp = Local::now();
        let backup_root = if self.backup_dir.is_absolute() {
            self.backup_dir.clone()
        } else {
            root.join(&self.backup_dir)
        };
        let dest = backup_root.join(timestamp.format("backup-%Y%m%d-%H%M%S%.3f").to_string());
        fs::create_dir_all(&dest)
            .map_err(|e| BackupError(format!("creating {}: {}", dest.display(), e)))?;

        let mut files_copied = 0;
        self.copy_tree(root, root, &dest, &backup_root, &mut files_copied)?;

        debug!(
            "Snapshot complete: {} files copied to {}",
            files_copied,
            dest.display()
        );
        Ok(BackupHandle {
            path: dest,
            timestamp,
            files_copied,
        })
    }

    fn copy_tree(
        &self,
        root: &Path,
        current: &Path,
        dest: &Path,
        backup_root: &Path,
        files_copied: &mut usize,
    ) -> Result<(), BackupError> {
        let entries = fs::read_dir(current)
            .map_err(|e| BackupError(format!("reading {}: {}", current.display(), e)))?;

        for entry in entries {
            let entry =
                entry.map_err(|e| BackupError(format!("reading {}: {}", current.display(), e)))?;
            let path = entry.path();

            // Never recurse into prior backups
            if path == backup_root {
                continue;
            }

            let rel = match path.strip_prefix(root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            if self.excludes.is_match(rel) {
                debug!("Skipping excluded path {}", rel.display());
                continue;
            }

            let file_type = entry
                .file_type()
                .map_err(|e| BackupError(format!("stat {}: {}", path.display(), e)))?;
            let target = dest.join(rel);

            if file_type.is_dir() {
                // Directories materialize lazily when a file inside them is
                // copied, so excluded subtrees leave nothing behind
                self.copy_tree(root, &path, dest, backup_root, files_copied)?;
            } else if file_type.is_file() {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| {
                        BackupError(format!("creating {}: {}", parent.display(), e))
                    })?;
                }
                fs::copy(&path, &target)
                    .map_err(|e| BackupError(format!("copying {}: {}", path.display(), e)))?;
                *files_copied += 1;
            }
            // Symlinks and other special files are not carried into snapshots
        }

        Ok(())
    }
}
