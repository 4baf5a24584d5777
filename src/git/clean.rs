//! Working tree cleaning for GitManager
//!
//! Removes every untracked and ignored entry like `git clean -fdx`. Nested
//! repositories are kept (git needs `-ff` for those) and excluded paths
//! survive even when they sit inside an untracked directory.

use git2::Error as GitError;
use std::fs;
use std::path::{Path, PathBuf};

use crate::git::types::CleanSummary;
use crate::git::GitManager;

impl GitManager {
    /// Remove untracked and ignored files and directories
    pub fn clean_untracked(&self, exclude: &[PathBuf]) -> Result<CleanSummary, GitError> {
        let workdir = self.workdir()?;
        let entries = self.list_untracked()?;

        let mut summary = CleanSummary::default();
        for entry in entries {
            let path = workdir.join(&entry.path);
            remove_entry(&path, exclude, &mut summary).map_err(|e| {
                GitError::from_str(&format!("Failed to remove {}: {}", path.display(), e))
            })?;
        }

        log::info!(
            "Cleaned {} entries ({} kept)",
            summary.removed.len(),
            summary.kept.len()
        );
        Ok(summary)
    }
}

fn is_excluded(path: &Path, exclude: &[PathBuf]) -> bool {
    exclude.iter().any(|e| path.starts_with(e))
}

fn contains_excluded(dir: &Path, exclude: &[PathBuf]) -> bool {
    exclude.iter().any(|e| e.starts_with(dir))
}

fn remove_entry(path: &Path, exclude: &[PathBuf], summary: &mut CleanSummary) -> std::io::Result<()> {
    if is_excluded(path, exclude) {
        summary.kept.push(path.to_path_buf());
        return Ok(());
    }

    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if !meta.is_dir() {
        fs::remove_file(path)?;
        summary.removed.push(path.to_path_buf());
        return Ok(());
    }

    if path.join(".git").exists() {
        log::debug!("Keeping nested repository {}", path.display());
        summary.kept.push(path.to_path_buf());
        return Ok(());
    }

    if contains_excluded(path, exclude) {
        for child in fs::read_dir(path)? {
            remove_entry(&child?.path(), exclude, summary)?;
        }
    } else {
        fs::remove_dir_all(path)?;
        summary.removed.push(path.to_path_buf());
    }
    Ok(())
}
