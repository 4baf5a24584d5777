// File and folder copies with explicit overwrite

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Filesystem operations used while reclaiming
pub trait FileOps {
    /// Create a directory and its parents
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Copy a file to `dest`, replacing an existing entry when `overwrite` is set
    fn copy_file(&self, src: &Path, dest: &Path, overwrite: bool) -> Result<()>;

    /// Copy a folder recursively to `dest`, replacing an existing entry when `overwrite` is set
    fn copy_dir(&self, src: &Path, dest: &Path, overwrite: bool) -> Result<()>;

    /// Delete a folder and everything in it
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
}

/// FileOps on the local disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileOps;

impl LocalFileOps {
    /// Clear the way for a copy
    fn prepare_dest(&self, dest: &Path, overwrite: bool) -> Result<()> {
        let existing = match fs::symlink_metadata(dest) {
            Ok(meta) => meta,
            Err(_) => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
                return Ok(());
            }
        };

        if !overwrite {
            return Err(anyhow!("{} already exists", dest.display()));
        }

        println!("{} already exists. Overwriting...", dest.display());
        if existing.is_dir() {
            fs::remove_dir_all(dest)
        } else {
            fs::remove_file(dest)
        }
        .with_context(|| format!("Failed to remove {}", dest.display()))
    }
}

impl FileOps for LocalFileOps {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("Failed to create {}", path.display()))
    }

    fn copy_file(&self, src: &Path, dest: &Path, overwrite: bool) -> Result<()> {
        if !src.is_file() {
            return Err(anyhow!("{} is not a file", src.display()));
        }
        self.prepare_dest(dest, overwrite)?;
        fs::copy(src, dest).with_context(|| {
            format!("Failed to copy {} to {}", src.display(), dest.display())
        })?;
        Ok(())
    }

    fn copy_dir(&self, src: &Path, dest: &Path, overwrite: bool) -> Result<()> {
        if !src.is_dir() {
            return Err(anyhow!("{} is not a folder", src.display()));
        }
        self.prepare_dest(dest, overwrite)?;

        // Links are followed, the copy holds their targets
        for entry in WalkDir::new(src).follow_links(true) {
            let entry = entry.with_context(|| format!("Failed to read {}", src.display()))?;
            let relative = entry
                .path()
                .strip_prefix(src)
                .with_context(|| format!("Unexpected path {}", entry.path().display()))?;
            let target = dest.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)
                    .with_context(|| format!("Failed to create {}", target.display()))?;
            } else {
                fs::copy(entry.path(), &target).with_context(|| {
                    format!("Failed to copy {} to {}", entry.path().display(), target.display())
                })?;
            }
        }
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).with_context(|| format!("Failed to remove {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, "a").unwrap();

        let dest = dir.path().join("nested/deeper/a.txt");
        LocalFileOps.copy_file(&src, &dest, false).unwrap();

        assert_eq!(fs::read_to_string(dest).unwrap(), "a");
    }

    #[test]
    fn test_copy_file_overwrite() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let dest = dir.path().join("b.txt");
        fs::write(&src, "new").unwrap();
        fs::write(&dest, "old").unwrap();

        assert!(LocalFileOps.copy_file(&src, &dest, false).is_err());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "old");

        LocalFileOps.copy_file(&src, &dest, true).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn test_copy_dir_replaces_existing_tree() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("data");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("sub/x.csv"), "x").unwrap();

        let dest = dir.path().join("backup/data");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.csv"), "stale").unwrap();

        LocalFileOps.copy_dir(&src, &dest, true).unwrap();

        assert_eq!(fs::read_to_string(dest.join("sub/x.csv")).unwrap(), "x");
        assert!(!dest.join("stale.csv").exists());
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        assert!(LocalFileOps.copy_file(&missing, &dir.path().join("x"), true).is_err());
        assert!(LocalFileOps.copy_dir(&missing, &dir.path().join("y"), true).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_dir_follows_links() {
        let dir = TempDir::new().unwrap();
        let outside = dir.path().join("outside.txt");
        fs::write(&outside, "target").unwrap();

        let src = dir.path().join("data");
        fs::create_dir_all(&src).unwrap();
        std::os::unix::fs::symlink(&outside, src.join("link.txt")).unwrap();

        let dest = dir.path().join("copy");
        LocalFileOps.copy_dir(&src, &dest, false).unwrap();

        let copied = dest.join("link.txt");
        assert!(!fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(copied).unwrap(), "target");
    }
}
