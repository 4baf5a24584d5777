// Retry and polling policies

use crate::shutdown::ShutdownState;
use std::time::Duration;

/// Fixed-delay retry policy.
///
/// `max_attempts` of `None` retries forever, which is what the interactive
/// tasks use; tests pass a bounded policy with a zero delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between two attempts
    pub delay: Duration,
    /// Maximum number of attempts, including the first
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retry forever with the given delay
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Stop after `max_attempts` attempts
    pub fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: Some(max_attempts),
        }
    }

    /// Check if another attempt is allowed after `attempts` were made
    pub fn allows(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts < max,
            None => true,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_secs(1))
    }
}

/// Blocking wait between attempts
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps until the delay elapses or the user interrupts
impl Sleeper for ShutdownState {
    fn sleep(&self, duration: Duration) {
        if self.wait(duration) {
            log::debug!("Wait cut short by interrupt");
        }
    }
}
