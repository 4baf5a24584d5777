// Configuration file loading

use crate::config::merger::PartialConfig;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File names probed in the project root, in order
pub const PROJECT_CONFIG_FILES: [&str; 3] = ["devtasks.yaml", "devtasks.yml", "devtasks.toml"];

/// Task configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Compose file used by `up` and `build`
    #[serde(rename = "composeFile", alias = "compose_file", default = "default_compose_file")]
    pub compose_file: String,
    /// Seconds between two pending-migration checks
    #[serde(rename = "secondsSleep", alias = "seconds_sleep", default = "default_seconds_sleep")]
    pub seconds_sleep: u64,
    /// Delay before re-running a failed seed command
    #[serde(rename = "seedRetryDelayMs", alias = "seed_retry_delay_ms", default = "default_seed_retry_delay_ms")]
    pub seed_retry_delay_ms: u64,
    /// Web container settings
    #[serde(default)]
    pub django: DjangoConfig,
    /// Image build settings
    #[serde(default)]
    pub docker: DockerConfig,
    /// Test runner settings
    #[serde(default)]
    pub test: TestConfig,
    /// Environment reclaim settings
    #[serde(rename = "cleanEnv", alias = "clean_env", default)]
    pub clean_env: CleanEnvConfig,
}

fn default_compose_file() -> String { "docker-compose.dev.yml".to_string() }
fn default_seconds_sleep() -> u64 { 5 }
fn default_seed_retry_delay_ms() -> u64 { 1000 }

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            compose_file: default_compose_file(),
            seconds_sleep: default_seconds_sleep(),
            seed_retry_delay_ms: default_seed_retry_delay_ms(),
            django: DjangoConfig::default(),
            docker: DockerConfig::default(),
            test: TestConfig::default(),
            clean_env: CleanEnvConfig::default(),
        }
    }
}

/// Web container configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DjangoConfig {
    /// Compose service running the web framework
    #[serde(default = "default_service")]
    pub service: String,
    /// Program that runs `./manage.py` inside the container
    #[serde(default = "default_executor")]
    pub executor: String,
}

fn default_service() -> String { "django".to_string() }
fn default_executor() -> String { "/entrypoint.sh".to_string() }

impl Default for DjangoConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            executor: default_executor(),
        }
    }
}

impl DjangoConfig {
    /// `docker compose exec <service>`
    pub fn exec_prefix(&self) -> String {
        format!("docker compose exec {}", self.service)
    }

    /// A management command run through the configured executor
    pub fn manage(&self, command: &str) -> String {
        self.manage_with(&self.executor, command)
    }

    /// A management command run through a specific executor
    pub fn manage_with(&self, executor: &str, command: &str) -> String {
        format!("{} {} ./manage.py {}", self.exec_prefix(), executor, command)
            .trim_end()
            .to_string()
    }
}

/// Image build configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Flags passed to `docker compose build`, without the leading `--`
    #[serde(rename = "buildArgs", alias = "build_args", default)]
    pub build_args: Vec<String>,
}

/// Test runner configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    /// Flags passed to `manage.py test`, without the leading `--`
    #[serde(default)]
    pub flags: Vec<String>,
}

/// Backup manifest for `clean`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanEnvConfig {
    /// Where timestamped backups go; relative paths resolve against the project root
    #[serde(rename = "bakDir", alias = "bak_dir", default)]
    pub bak_dir: Option<String>,
    /// Files kept across a clean
    #[serde(rename = "bkFiles", alias = "bk_files", default)]
    pub bk_files: Vec<String>,
    /// Folders kept across a clean
    #[serde(rename = "bkFolders", alias = "bk_folders", default)]
    pub bk_folders: Vec<String>,
    /// Delete the backup once restored
    #[serde(rename = "removeBackupAfterCopy", alias = "remove_backup_after_copy", default)]
    pub remove_backup_after_copy: bool,
}

/// Config loader
pub struct ConfigLoader {
    /// Global config path
    global_path: Option<PathBuf>,
    /// Project config path
    project_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            global_path: Self::get_global_config_path(),
            project_path: None,
        }
    }

    /// Use the first existing `devtasks.{yaml,yml,toml}` of the project root
    pub fn with_project_root(mut self, root: &Path) -> Self {
        self.project_path = PROJECT_CONFIG_FILES
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.exists());
        self
    }

    /// Use an explicit project config file
    pub fn with_config_file(mut self, path: &Path) -> Self {
        self.project_path = Some(path.to_path_buf());
        self
    }

    /// Use an explicit per-user config file
    pub fn with_global_file(mut self, path: &Path) -> Self {
        self.global_path = Some(path.to_path_buf());
        self
    }

    /// Skip the per-user config file
    pub fn without_global(mut self) -> Self {
        self.global_path = None;
        self
    }

    /// Get the global config path
    fn get_global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("devtasks").join("config.yaml"))
    }

    /// Load global config
    pub fn load_global(&self) -> Result<Option<PartialConfig>> {
        if let Some(ref path) = self.global_path {
            self.load_from_path(path)
        } else {
            Ok(None)
        }
    }

    /// Load project config
    pub fn load_project(&self) -> Result<Option<PartialConfig>> {
        if let Some(ref path) = self.project_path {
            self.load_from_path(path)
        } else {
            Ok(None)
        }
    }

    /// Load config from a specific path, YAML unless the extension says TOML.
    /// Keys the file leaves out stay unset.
    pub fn load_from_path(&self, path: &Path) -> Result<Option<PartialConfig>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

        let is_toml = path.extension().map_or(false, |ext| ext == "toml");
        let config: PartialConfig = if is_toml {
            toml::from_str(&contents)
                .map_err(|e| anyhow!("Failed to parse config file '{}': {}", path.display(), e))?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| anyhow!("Failed to parse config file '{}': {}", path.display(), e))?
        };

        self.validate_config(&config)?;
        log::debug!("Loaded config from: {}", path.display());

        Ok(Some(config))
    }

    /// Validate config values
    fn validate_config(&self, config: &PartialConfig) -> Result<()> {
        let blank = |value: &Option<String>| value.as_deref().is_some_and(|v| v.trim().is_empty());

        if blank(&config.django.service) {
            return Err(anyhow!("django.service cannot be empty"));
        }

        if blank(&config.compose_file) {
            return Err(anyhow!("composeFile cannot be empty"));
        }

        Ok(())
    }

    /// Get the global config path
    pub fn global_config_path(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the project config path
    pub fn project_config_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
