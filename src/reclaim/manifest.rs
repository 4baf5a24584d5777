// Backup manifest and timestamped backup folders

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDateTime};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::CleanEnvConfig;
use crate::utils::resolve_path;

/// Folder name of one backup, e.g. `03-07-24T091505`
pub const BACKUP_DATE_FORMAT: &str = "%m-%d-%yT%H%M%S";

/// Fallback backup location inside the project
pub const LOCAL_BACKUP_DIR: &str = ".devtasks-backups";

/// Source of the local wall-clock time
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Clock reading the system local time
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Paths preserved across a clean and where their copies go
#[derive(Debug, Clone, PartialEq)]
pub struct BackupManifest {
    /// Files, relative to the project root
    pub files: Vec<PathBuf>,
    /// Folders, relative to the project root
    pub folders: Vec<PathBuf>,
    /// Directory holding the timestamped backups
    pub base_dir: PathBuf,
    /// Delete the backup once restored
    pub remove_backup_after_copy: bool,
}

impl BackupManifest {
    /// Build the manifest of `root` from the `cleanEnv` section
    pub fn from_config(config: &CleanEnvConfig, root: &Path) -> Self {
        let base_dir = match config.bak_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => resolve_path(root, dir),
            _ => default_base_dir(root),
        };

        Self {
            files: config.bk_files.iter().map(PathBuf::from).collect(),
            folders: config.bk_folders.iter().map(PathBuf::from).collect(),
            base_dir,
            remove_backup_after_copy: config.remove_backup_after_copy,
        }
    }

    /// Name of the backup folder for a point in time
    pub fn backup_folder_name(at: NaiveDateTime) -> String {
        at.format(BACKUP_DATE_FORMAT).to_string()
    }

    /// Backup folder for this run
    pub fn backup_folder(&self, clock: &dyn Clock) -> PathBuf {
        self.base_dir.join(Self::backup_folder_name(clock.now()))
    }

    /// Every entry with the name it is stored under in the backup folder
    pub fn entries(&self) -> Result<Vec<(PathBuf, String, bool)>> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        let files = self.files.iter().map(|p| (p, false));
        let folders = self.folders.iter().map(|p| (p, true));
        for (path, is_dir) in files.chain(folders) {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow!("Cannot back up '{}': no file name", path.display()))?
                .to_string();

            // Backups are stored flat, two entries may not share a name
            if !seen.insert(name.clone()) {
                return Err(anyhow!(
                    "Cannot back up '{}': another entry is also named '{}'",
                    path.display(),
                    name
                ));
            }
            entries.push((path.clone(), name, is_dir));
        }

        Ok(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.is_empty()
    }
}

/// `<data dir>/devtasks/backups/<project>`, or a folder in the project
fn default_base_dir(root: &Path) -> PathBuf {
    let project = root.file_name().map(|n| n.to_os_string());
    match (dirs::data_local_dir(), project) {
        (Some(data), Some(project)) => data.join("devtasks").join("backups").join(project),
        _ => root.join(LOCAL_BACKUP_DIR),
    }
}
