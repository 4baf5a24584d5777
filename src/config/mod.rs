//! Task configuration
//!
//! Values are merged with priority env -> project file -> global file -> defaults.

mod loader;
mod merger;

pub use loader::{
    CleanEnvConfig, ConfigLoader, DjangoConfig, DockerConfig, TasksConfig, TestConfig,
    PROJECT_CONFIG_FILES,
};
pub use merger::{
    ConfigMerger, PartialCleanEnvConfig, PartialConfig, PartialDjangoConfig, PartialDockerConfig,
    PartialTestConfig, ENV_PREFIX,
};

use anyhow::Result;
use std::path::Path;

/// Load the effective configuration for a project
pub fn load_config(project_root: &Path, config_file: Option<&Path>) -> Result<TasksConfig> {
    let loader = match config_file {
        Some(path) => ConfigLoader::new().with_config_file(path),
        None => ConfigLoader::new().with_project_root(project_root),
    };

    let config = ConfigMerger::new()
        .with_global(loader.load_global()?)
        .with_project(loader.load_project()?)
        .with_env(Some(PartialConfig::from_env()?))
        .merge();

    Ok(config)
}
