//! Process execution for tasks
//!
//! Every task builds a shell command string and hands it to a [`CommandRunner`].
//! - `shell` - the real runner (piped stdio or a pseudo-terminal)
//! - `responder` - output-matching auto answers for interactive prompts

mod responder;
mod shell;

pub use responder::Responder;
pub use shell::ShellRunner;

use thiserror::Error;

/// How a command should be executed
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Attach the child to a pseudo-terminal
    pub pty: bool,
    /// Capture output without echoing it
    pub hide: bool,
    /// Prompt watchers applied to the live output
    pub responders: Vec<Responder>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pty(mut self) -> Self {
        self.pty = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hide = true;
        self
    }

    pub fn with_hide(mut self, hide: bool) -> Self {
        self.hide = hide;
        self
    }

    pub fn with_responder(mut self, responder: Responder) -> Self {
        self.responders.push(responder);
        self
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Command `{command}` exited with code {exit_code}")]
    Failure {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Command `{command}` was interrupted")]
    Interrupted { command: String },

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error while running command: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// Whether the user asked to stop, as opposed to the command failing
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RunError::Interrupted { .. })
    }
}

/// Executes shell command lines
pub trait CommandRunner {
    fn run(&self, command: &str, options: &RunOptions) -> Result<RunOutput, RunError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, command: &str, options: &RunOptions) -> Result<RunOutput, RunError> {
        (**self).run(command, options)
    }
}
