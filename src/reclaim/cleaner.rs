// Working tree cleaning

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::git::{CleanSummary, GitManager};

/// Removes everything version control does not track
pub trait TreeCleaner {
    /// Clean `root`, leaving the `exclude` paths (absolute, canonical) alone
    fn clean(&self, root: &Path, exclude: &[PathBuf]) -> Result<CleanSummary>;
}

/// `git clean -fdx` through libgit2
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCleaner;

impl TreeCleaner for GitCleaner {
    fn clean(&self, root: &Path, exclude: &[PathBuf]) -> Result<CleanSummary> {
        let manager = GitManager::new(root)
            .with_context(|| format!("{} is not a git repository", root.display()))?;
        let summary = manager
            .clean_untracked(exclude)
            .with_context(|| format!("Failed to clean {}", root.display()))?;
        Ok(summary)
    }
}
