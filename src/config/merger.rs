// Configuration merging with priority

use crate::config::loader::{CleanEnvConfig, DjangoConfig, DockerConfig, TasksConfig, TestConfig};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "DEVTASKS_";

/// Partial configuration for merging
/// Uses Option<T> for all fields to support partial overrides. Config files
/// deserialize into this shape too, so keys a file leaves out fall through
/// to the layer below.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialConfig {
    #[serde(alias = "compose_file")]
    pub compose_file: Option<String>,
    #[serde(alias = "seconds_sleep")]
    pub seconds_sleep: Option<u64>,
    #[serde(alias = "seed_retry_delay_ms")]
    pub seed_retry_delay_ms: Option<u64>,
    pub django: PartialDjangoConfig,
    pub docker: PartialDockerConfig,
    pub test: PartialTestConfig,
    #[serde(alias = "clean_env")]
    pub clean_env: PartialCleanEnvConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PartialDjangoConfig {
    pub service: Option<String>,
    pub executor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialDockerConfig {
    #[serde(alias = "build_args")]
    pub build_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PartialTestConfig {
    pub flags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialCleanEnvConfig {
    #[serde(alias = "bak_dir")]
    pub bak_dir: Option<String>,
    #[serde(alias = "bk_files")]
    pub bk_files: Option<Vec<String>>,
    #[serde(alias = "bk_folders")]
    pub bk_folders: Option<Vec<String>>,
    #[serde(alias = "remove_backup_after_copy")]
    pub remove_backup_after_copy: Option<bool>,
}

impl PartialConfig {
    /// Overrides from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Overrides from `DEVTASKS_*` variables; lists are comma-separated
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut partial = PartialConfig::default();

        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();

            match name {
                "COMPOSE_FILE" => partial.compose_file = Some(value.to_string()),
                "SECONDS_SLEEP" => partial.seconds_sleep = Some(parse_number(name, value)?),
                "SEED_RETRY_DELAY_MS" => {
                    partial.seed_retry_delay_ms = Some(parse_number(name, value)?)
                }
                "DJANGO_SERVICE" => partial.django.service = Some(value.to_string()),
                "DJANGO_EXECUTOR" => partial.django.executor = Some(value.to_string()),
                "DOCKER_BUILD_ARGS" => partial.docker.build_args = Some(split_list(value)),
                "TEST_FLAGS" => partial.test.flags = Some(split_list(value)),
                "CLEAN_BAK_DIR" => partial.clean_env.bak_dir = Some(value.to_string()),
                "CLEAN_BK_FILES" => partial.clean_env.bk_files = Some(split_list(value)),
                "CLEAN_BK_FOLDERS" => partial.clean_env.bk_folders = Some(split_list(value)),
                "CLEAN_REMOVE_BACKUP_AFTER_COPY" => {
                    partial.clean_env.remove_backup_after_copy = Some(parse_bool(name, value)?)
                }
                other => log::debug!("Ignoring unknown override {}{}", ENV_PREFIX, other),
            }
        }

        Ok(partial)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("Invalid value '{}' for {}{}: {}", value, ENV_PREFIX, name, e))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(anyhow!(
            "Invalid boolean '{}' for {}{}",
            value,
            ENV_PREFIX,
            name
        )),
    }
}

/// Configuration merger
/// Priority order: Env -> Project -> Global -> Defaults
pub struct ConfigMerger {
    defaults: TasksConfig,
    global: Option<PartialConfig>,
    project: Option<PartialConfig>,
    env: Option<PartialConfig>,
}

impl ConfigMerger {
    /// Create a new config merger with defaults
    pub fn new() -> Self {
        Self {
            defaults: TasksConfig::default(),
            global: None,
            project: None,
            env: None,
        }
    }

    /// Set global config
    pub fn with_global(mut self, config: Option<PartialConfig>) -> Self {
        self.global = config;
        self
    }

    /// Set project config
    pub fn with_project(mut self, config: Option<PartialConfig>) -> Self {
        self.project = config;
        self
    }

    /// Set environment overrides
    pub fn with_env(mut self, config: Option<PartialConfig>) -> Self {
        self.env = config;
        self
    }

    /// Merge all configs with priority
    pub fn merge(&self) -> TasksConfig {
        // Lowest priority first, each layer only sets the keys it names
        [&self.global, &self.project, &self.env]
            .into_iter()
            .flatten()
            .fold(self.defaults.clone(), |base, layer| {
                self.merge_partial(&base, layer)
            })
    }

    /// Merge partial config into full config
    fn merge_partial(&self, base: &TasksConfig, partial: &PartialConfig) -> TasksConfig {
        TasksConfig {
            compose_file: partial
                .compose_file
                .clone()
                .unwrap_or_else(|| base.compose_file.clone()),
            seconds_sleep: partial.seconds_sleep.unwrap_or(base.seconds_sleep),
            seed_retry_delay_ms: partial
                .seed_retry_delay_ms
                .unwrap_or(base.seed_retry_delay_ms),
            django: DjangoConfig {
                service: partial
                    .django
                    .service
                    .clone()
                    .unwrap_or_else(|| base.django.service.clone()),
                executor: partial
                    .django
                    .executor
                    .clone()
                    .unwrap_or_else(|| base.django.executor.clone()),
            },
            docker: DockerConfig {
                build_args: partial
                    .docker
                    .build_args
                    .clone()
                    .unwrap_or_else(|| base.docker.build_args.clone()),
            },
            test: TestConfig {
                flags: partial
                    .test
                    .flags
                    .clone()
                    .unwrap_or_else(|| base.test.flags.clone()),
            },
            clean_env: self.merge_partial_clean_env(&base.clean_env, &partial.clean_env),
        }
    }

    fn merge_partial_clean_env(
        &self,
        base: &CleanEnvConfig,
        partial: &PartialCleanEnvConfig,
    ) -> CleanEnvConfig {
        CleanEnvConfig {
            bak_dir: partial.bak_dir.clone().or_else(|| base.bak_dir.clone()),
            bk_files: partial
                .bk_files
                .clone()
                .unwrap_or_else(|| base.bk_files.clone()),
            bk_folders: partial
                .bk_folders
                .clone()
                .unwrap_or_else(|| base.bk_folders.clone()),
            remove_backup_after_copy: partial
                .remove_backup_after_copy
                .unwrap_or(base.remove_backup_after_copy),
        }
    }
}

impl Default for ConfigMerger {
    fn default() -> Self {
        Self::new()
    }
}
