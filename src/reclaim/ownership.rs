// Project ownership precondition

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Ownership check failures
#[derive(Debug, Error)]
pub enum OwnershipError {
    #[error("File {} is not owned by the user running the script. {}", .path.display(), remediation(.root))]
    NotOwned { path: PathBuf, root: PathBuf },

    #[error("Failed to inspect {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// What the user has to run to fix ownership of `root`
pub fn remediation(root: &Path) -> String {
    format!(
        "There are files that aren't owned by the user running the script, run `sudo chown -R $USER {}` and try again.",
        root.display()
    )
}

/// Decides whether the project tree may be cleaned
pub trait PermissionCheck {
    fn check(&self, root: &Path) -> Result<(), OwnershipError>;
}

/// Accepts every tree
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPermissionCheck;

impl PermissionCheck for NoopPermissionCheck {
    fn check(&self, _root: &Path) -> Result<(), OwnershipError> {
        Ok(())
    }
}

/// Requires every file to belong to one user.
///
/// Symbolic links are followed so the folders they point to are walked, but
/// a link itself is trusted and never checked. Directories are traversed,
/// not checked.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub struct UidOwnershipCheck {
    uid: u32,
}

#[cfg(unix)]
impl UidOwnershipCheck {
    /// Check against the real uid of this process
    pub fn current_user() -> Self {
        Self {
            uid: nix::unistd::getuid().as_raw(),
        }
    }

    pub fn for_uid(uid: u32) -> Self {
        Self { uid }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }
}

#[cfg(unix)]
impl PermissionCheck for UidOwnershipCheck {
    fn check(&self, root: &Path) -> Result<(), OwnershipError> {
        use std::os::unix::fs::MetadataExt;
        use walkdir::WalkDir;

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    // Dangling links and link cycles are links too
                    let is_link = std::fs::symlink_metadata(&path)
                        .map(|m| m.file_type().is_symlink())
                        .unwrap_or(false);
                    if is_link || e.loop_ancestor().is_some() {
                        log::debug!("Skipping unreadable link {}", path.display());
                        continue;
                    }
                    return Err(OwnershipError::Walk { path, source: e });
                }
            };

            if entry.file_type().is_dir() || entry.path_is_symlink() {
                continue;
            }

            let owner = entry
                .metadata()
                .map_err(|e| OwnershipError::Walk {
                    path: entry.path().to_path_buf(),
                    source: e,
                })?
                .uid();
            if owner != self.uid {
                log::warn!(
                    "{} belongs to uid {}, expected {}",
                    entry.path().display(),
                    owner,
                    self.uid
                );
                return Err(OwnershipError::NotOwned {
                    path: entry.path().to_path_buf(),
                    root: root.to_path_buf(),
                });
            }
        }
        Ok(())
    }
}

/// The check used by `clean`: uid based on unix unless skipped
pub fn default_permission_check(skip: bool) -> Box<dyn PermissionCheck> {
    if skip {
        return Box::new(NoopPermissionCheck);
    }
    #[cfg(unix)]
    {
        Box::new(UidOwnershipCheck::current_user())
    }
    #[cfg(not(unix))]
    {
        Box::new(NoopPermissionCheck)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/app")).unwrap();
        fs::write(dir.path().join("src/app/models.py"), "x").unwrap();
        fs::write(dir.path().join("README.md"), "x").unwrap();
        dir
    }

    #[test]
    fn test_owned_tree_passes() {
        let dir = tree();
        UidOwnershipCheck::current_user().check(dir.path()).unwrap();
    }

    #[test]
    fn test_foreign_file_is_a_violation() {
        let dir = tree();
        let other = UidOwnershipCheck::current_user().uid().wrapping_add(1);

        let err = UidOwnershipCheck::for_uid(other).check(dir.path()).unwrap_err();

        match &err {
            OwnershipError::NotOwned { root, .. } => assert_eq!(root, dir.path()),
            unexpected => panic!("unexpected error: {unexpected}"),
        }
        let message = err.to_string();
        assert!(message.contains("sudo chown -R $USER"));
        assert!(message.contains(&dir.path().display().to_string()));
    }

    #[test]
    fn test_empty_directories_are_not_checked() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        let other = UidOwnershipCheck::current_user().uid().wrapping_add(1);

        UidOwnershipCheck::for_uid(other).check(dir.path()).unwrap();
    }

    #[test]
    fn test_links_are_trusted() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("target.txt"), "x").unwrap();

        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path().join("target.txt"), dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("dangling")).unwrap();
        let other = UidOwnershipCheck::current_user().uid().wrapping_add(1);

        UidOwnershipCheck::for_uid(other).check(dir.path()).unwrap();
    }

    #[test]
    fn test_linked_folders_are_walked() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("inner.txt"), "x").unwrap();

        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("linked")).unwrap();
        let other = UidOwnershipCheck::current_user().uid().wrapping_add(1);

        assert!(UidOwnershipCheck::for_uid(other).check(dir.path()).is_err());
    }

    #[test]
    fn test_skip_uses_noop() {
        let dir = tree();
        default_permission_check(true).check(dir.path()).unwrap();
    }
}
