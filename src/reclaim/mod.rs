//! Environment reclaim
//!
//! Backs up the configured files and folders, wipes everything git does not
//! track, then puts the backups back. Nothing is touched unless the whole
//! project belongs to the user running the command.
//!
//! - `manifest` - what to keep and where backups go
//! - `ownership` - the ownership precondition
//! - `copy` - overwrite-aware copies
//! - `cleaner` - the `git clean -fdx` step

mod cleaner;
mod copy;
mod manifest;
mod ownership;

pub use cleaner::{GitCleaner, TreeCleaner};
pub use copy::{FileOps, LocalFileOps};
pub use manifest::{BackupManifest, Clock, LocalClock, BACKUP_DATE_FORMAT, LOCAL_BACKUP_DIR};
#[cfg(unix)]
pub use ownership::UidOwnershipCheck;
pub use ownership::{
    default_permission_check, remediation, NoopPermissionCheck, OwnershipError, PermissionCheck,
};

use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reclaim failures
#[derive(Debug, Error)]
pub enum ReclaimError {
    /// The tree holds files of another user; nothing was modified
    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReclaimError {
    pub fn is_ownership(&self) -> bool {
        matches!(self, ReclaimError::Ownership(_))
    }
}

/// What a reclaim did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReclaimReport {
    pub backup_dir: PathBuf,
    /// Manifest entries copied out and back
    pub restored: Vec<PathBuf>,
    /// Entries removed by the clean
    pub removed: usize,
    pub backup_removed: bool,
}

/// Runs backup, clean and restore over one project
pub struct Reclaimer {
    root: PathBuf,
    manifest: BackupManifest,
    permissions: Box<dyn PermissionCheck>,
    files: Box<dyn FileOps>,
    cleaner: Box<dyn TreeCleaner>,
    clock: Box<dyn Clock>,
}

impl Reclaimer {
    pub fn new(root: impl Into<PathBuf>, manifest: BackupManifest) -> Self {
        Self {
            root: root.into(),
            manifest,
            permissions: default_permission_check(false),
            files: Box::new(LocalFileOps),
            cleaner: Box::new(GitCleaner),
            clock: Box::new(LocalClock),
        }
    }

    pub fn with_permission_check(mut self, check: Box<dyn PermissionCheck>) -> Self {
        self.permissions = check;
        self
    }

    pub fn with_file_ops(mut self, files: Box<dyn FileOps>) -> Self {
        self.files = files;
        self
    }

    pub fn with_cleaner(mut self, cleaner: Box<dyn TreeCleaner>) -> Self {
        self.cleaner = cleaner;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Back up, clean and restore the project
    pub fn reclaim(&self) -> Result<ReclaimReport, ReclaimError> {
        let root = self
            .root
            .canonicalize()
            .with_context(|| format!("Project root {} not found", self.root.display()))?;

        self.permissions.check(&root)?;

        // Rejects unusable manifests before anything is written
        let entries = self.manifest.entries()?;

        let backup_dir = self.manifest.backup_folder(self.clock.as_ref());
        self.files.create_dir_all(&backup_dir)?;
        println!("Backing up to {}...", backup_dir.display());

        for (path, name, is_dir) in &entries {
            let src = root.join(path);
            let dest = backup_dir.join(name);
            if *is_dir {
                self.files.copy_dir(&src, &dest, true)?;
            } else {
                self.files.copy_file(&src, &dest, true)?;
            }
            log::debug!("Backed up {} to {}", src.display(), dest.display());
        }

        println!("Cleaning...");
        let exclude = self.exclusions(&root);
        let summary = self.cleaner.clean(&root, &exclude)?;

        println!("Restoring backups...");
        let mut restored = Vec::with_capacity(entries.len());
        for (path, name, is_dir) in &entries {
            let src = backup_dir.join(name);
            let dest = root.join(path);
            if *is_dir {
                self.files.copy_dir(&src, &dest, true)?;
            } else {
                self.files.copy_file(&src, &dest, true)?;
            }
            restored.push(path.clone());
        }

        if self.manifest.remove_backup_after_copy {
            println!("Removing backups...");
            self.files.remove_dir_all(&backup_dir)?;
        }
        println!("Done!");

        Ok(ReclaimReport {
            backup_dir,
            restored,
            removed: summary.removed.len(),
            backup_removed: self.manifest.remove_backup_after_copy,
        })
    }

    /// The backup base directory, when it lies inside the project
    fn exclusions(&self, root: &Path) -> Vec<PathBuf> {
        match self.manifest.base_dir.canonicalize() {
            Ok(base) if base.starts_with(root) => vec![base],
            _ => Vec::new(),
        }
    }
}
