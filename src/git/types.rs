//! Git data types and structures
//!
//! Contains all shared types used across git operations

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Why an entry is outside version control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Untracked,
    Ignored,
}

/// A working tree entry that `clean` would remove
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UntrackedEntry {
    /// Path relative to the working directory, without a trailing slash
    pub path: String,
    pub kind: EntryKind,
    /// Collapsed directory (git reports the directory, not its contents)
    pub is_dir: bool,
}

/// Result of cleaning the working tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanSummary {
    /// Absolute paths removed
    pub removed: Vec<PathBuf>,
    /// Absolute paths left in place (exclusions and nested repositories)
    pub kept: Vec<PathBuf>,
}
