//! Core GitManager implementation
//!
//! Contains the GitManager struct and its basic operations

use git2::{Error as GitError, Repository};
use std::path::{Path, PathBuf};

/// Git manager for repository operations
pub struct GitManager {
    pub(crate) repo: Repository,
}

impl GitManager {
    /// Create a new GitManager for the given repository path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let repo = Repository::open(path)?;
        Ok(Self { repo })
    }

    /// Get the repository path (the `.git` directory)
    pub fn repo_path(&self) -> PathBuf {
        self.repo.path().to_path_buf()
    }

    /// Get the canonical working directory
    pub fn workdir(&self) -> Result<PathBuf, GitError> {
        let workdir = self
            .repo
            .workdir()
            .ok_or_else(|| GitError::from_str("Repository has no working directory"))?;
        workdir
            .canonicalize()
            .map_err(|e| GitError::from_str(&format!("Failed to resolve {}: {}", workdir.display(), e)))
    }
}
