// Utility functions

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

// =============================================================================
// Path Helpers
// =============================================================================

/// Resolve `path` against `root` unless it is already absolute.
///
/// # Example
/// ```ignore
/// use crate::utils::resolve_path;
///
/// // Instead of: if p.is_absolute() { p } else { root.join(p) }
/// let config = resolve_path(&root, "devtasks.yaml");
/// ```
#[inline]
pub fn resolve_path(root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// The canonical project root: `--root` when given, else the current directory
pub fn project_root(arg: Option<&Path>) -> Result<PathBuf> {
    let root = match arg {
        Some(root) => root.to_path_buf(),
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };
    root.canonicalize()
        .with_context(|| format!("Project root {} not found", root.display()))
}
