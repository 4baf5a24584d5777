// Task handlers behind the CLI subcommands
//
// Every handler builds a shell command from the effective configuration and
// runs it through the context's CommandRunner.

pub mod compose;
pub mod environment;
pub mod manage;

pub use compose::*;
pub use environment::*;
pub use manage::*;

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use crate::config::TasksConfig;
use crate::runner::{CommandRunner, RunOptions, RunOutput};
use crate::shutdown::ShutdownState;

/// Everything a task needs to run
pub struct TaskContext<'a> {
    pub config: &'a TasksConfig,
    pub runner: &'a dyn CommandRunner,
    pub root: PathBuf,
    pub shutdown: ShutdownState,
}

impl<'a> TaskContext<'a> {
    pub fn new(
        config: &'a TasksConfig,
        runner: &'a dyn CommandRunner,
        root: impl Into<PathBuf>,
        shutdown: ShutdownState,
    ) -> Self {
        Self {
            config,
            runner,
            root: root.into(),
            shutdown,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run with the terminal attached directly
    pub fn run(&self, command: &str) -> Result<RunOutput> {
        self.run_with(command, &RunOptions::new())
    }

    /// Run inside a pseudo-terminal
    pub fn run_pty(&self, command: &str) -> Result<RunOutput> {
        self.run_with(command, &RunOptions::new().pty())
    }

    pub fn run_with(&self, command: &str, options: &RunOptions) -> Result<RunOutput> {
        log::debug!("Running: {}", command);
        Ok(self.runner.run(command, options)?)
    }
}

/// Fail early when an external program is missing
pub fn ensure_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|e| anyhow!("`{}` is required but was not found: {}", name, e))
}

/// Comma-separated service list to a space-separated one
pub(crate) fn services_arg(services: &str) -> String {
    services
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Join non-empty command parts with single spaces
pub(crate) fn join_parts<'s>(parts: impl IntoIterator<Item = &'s str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `--flag` for every configured flag
pub(crate) fn long_flags(flags: &[String]) -> String {
    flags
        .iter()
        .map(|f| format!("--{}", f.trim_start_matches('-')))
        .collect::<Vec<_>>()
        .join(" ")
}
