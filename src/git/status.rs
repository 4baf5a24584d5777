//! Status and file tracking operations for GitManager
//!
//! Contains methods for listing entries outside version control

use git2::{Error as GitError, Status, StatusOptions};

use crate::git::types::{EntryKind, UntrackedEntry};
use crate::git::GitManager;

impl GitManager {
    /// List untracked and ignored entries, collapsed to their top directory
    pub fn list_untracked(&self) -> Result<Vec<UntrackedEntry>, GitError> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true);
        opts.include_ignored(true);
        opts.recurse_untracked_dirs(false);
        opts.recurse_ignored_dirs(false);
        opts.exclude_submodules(true);

        let statuses = self.repo.statuses(Some(&mut opts))?;

        let mut result = Vec::new();
        for entry in statuses.iter() {
            let Some(kind) = Self::entry_kind(entry.status()) else {
                continue;
            };
            if let Some(path) = entry.path() {
                result.push(UntrackedEntry {
                    path: path.trim_end_matches('/').to_string(),
                    kind,
                    is_dir: path.ends_with('/'),
                });
            }
        }

        Ok(result)
    }

    /// Map a Status to the reason it would be cleaned, if any
    pub(crate) fn entry_kind(status: Status) -> Option<EntryKind> {
        if status.contains(Status::IGNORED) {
            Some(EntryKind::Ignored)
        } else if status.contains(Status::WT_NEW) {
            Some(EntryKind::Untracked)
        } else {
            None
        }
    }
}
