//! Migration-gated database seeding
//!
//! Waits until the web container reports no pending migrations, then runs the
//! `refresh_db` management command, answering its confirmation prompt and
//! retrying until it succeeds or the user interrupts.
//!
//! - `migrations` - status query and `[ ]` marker parsing
//! - `policy` - retry policy and the sleeper seam
//! - `request` - seed parameters and the rendered command line

mod migrations;
mod policy;
mod request;

pub use migrations::{has_unapplied, showmigrations_command, unapplied_migrations, UNAPPLIED_MARKER};
pub use policy::{RetryPolicy, Sleeper};
pub use request::{
    SeedRequest, CONFIRM_PROMPT, CONFIRM_RESPONSE, DEFAULT_CRM_DATA_DAY_COUNT, DEFAULT_PATIENT_COUNT,
    DEFAULT_RPM_DATA_DAY_COUNT,
};

use anyhow::Result;

use crate::config::DjangoConfig;
use crate::runner::{CommandRunner, Responder, RunOptions};
use crate::shutdown::ShutdownState;

/// How a seeding run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The seed command completed
    Seeded { attempts: u32 },
    /// The user interrupted the run
    Aborted,
    /// The retry policy ran out before the command succeeded
    ExhaustedRetries { attempts: u32 },
    /// The poll policy ran out while migrations were still pending
    MigrationsPending { polls: u32 },
}

/// Runs the seed command once migrations are applied
pub struct Seeder<'a> {
    runner: &'a dyn CommandRunner,
    sleeper: &'a dyn Sleeper,
    django: &'a DjangoConfig,
    poll: RetryPolicy,
    retry: RetryPolicy,
    shutdown: Option<ShutdownState>,
}

impl<'a> Seeder<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        sleeper: &'a dyn Sleeper,
        django: &'a DjangoConfig,
    ) -> Self {
        Self {
            runner,
            sleeper,
            django,
            poll: RetryPolicy::default(),
            retry: RetryPolicy::default(),
            shutdown: None,
        }
    }

    /// Policy for re-checking pending migrations
    pub fn with_poll_policy(mut self, policy: RetryPolicy) -> Self {
        self.poll = policy;
        self
    }

    /// Policy for re-running a failed seed command
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Stop waiting when the user interrupts
    pub fn with_shutdown(mut self, shutdown: ShutdownState) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn interrupted(&self) -> bool {
        self.shutdown
            .as_ref()
            .map_or(false, |s| s.is_shutdown_requested())
    }

    /// Block until no migration is pending.
    /// Returns the outcome to report if waiting was cut short.
    fn wait_for_migrations(&self) -> Option<SeedOutcome> {
        let mut polls = 0;
        while unapplied_migrations(self.runner, self.django) {
            polls += 1;
            if self.interrupted() {
                return Some(SeedOutcome::Aborted);
            }
            if !self.poll.allows(polls) {
                return Some(SeedOutcome::MigrationsPending { polls });
            }
            println!("There are unapplied migrations, sleeping...");
            self.sleeper.sleep(self.poll.delay);
        }
        None
    }

    /// Reset and fill the database with sample data
    pub fn seed(&self, request: &SeedRequest) -> Result<SeedOutcome> {
        if let Some(outcome) = self.wait_for_migrations() {
            return Ok(outcome);
        }

        let command = self.django.manage(&request.management_command());
        let options = RunOptions::new()
            .pty()
            .with_responder(Responder::new(CONFIRM_PROMPT, CONFIRM_RESPONSE)?);

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.runner.run(&command, &options) {
                Ok(_) => {
                    log::info!("Seeding finished after {} attempt(s)", attempts);
                    return Ok(SeedOutcome::Seeded { attempts });
                }
                Err(e) if e.is_interrupted() => {
                    log::info!("Seeding interrupted by user");
                    return Ok(SeedOutcome::Aborted);
                }
                Err(e) => {
                    log::warn!("Seeding attempt {} failed: {}", attempts, e);
                    if !self.retry.allows(attempts) {
                        return Ok(SeedOutcome::ExhaustedRetries { attempts });
                    }
                    if self.interrupted() {
                        return Ok(SeedOutcome::Aborted);
                    }
                    self.sleeper.sleep(self.retry.delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{RunError, RunOutput};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Runner replaying canned results for status queries and seed runs
    struct ScriptedRunner {
        statuses: RefCell<VecDeque<Result<String, ()>>>,
        seeds: RefCell<VecDeque<Result<(), bool>>>,
        seed_calls: RefCell<Vec<RunOptions>>,
        status_calls: RefCell<u32>,
    }

    impl ScriptedRunner {
        fn new() -> Self {
            Self {
                statuses: RefCell::new(VecDeque::new()),
                seeds: RefCell::new(VecDeque::new()),
                seed_calls: RefCell::new(Vec::new()),
                status_calls: RefCell::new(0),
            }
        }

        fn status(self, output: &str) -> Self {
            self.statuses.borrow_mut().push_back(Ok(output.to_string()));
            self
        }

        fn status_error(self) -> Self {
            self.statuses.borrow_mut().push_back(Err(()));
            self
        }

        /// `Err(true)` is an interruption, `Err(false)` a plain failure
        fn seed_result(self, result: Result<(), bool>) -> Self {
            self.seeds.borrow_mut().push_back(result);
            self
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, command: &str, options: &RunOptions) -> Result<RunOutput, RunError> {
            if command.contains("showmigrations") {
                *self.status_calls.borrow_mut() += 1;
                return match self.statuses.borrow_mut().pop_front() {
                    Some(Ok(stdout)) => Ok(RunOutput {
                        stdout,
                        ..Default::default()
                    }),
                    Some(Err(())) => Err(RunError::Failure {
                        command: command.to_string(),
                        exit_code: 1,
                        stdout: String::new(),
                        stderr: "no such service".to_string(),
                    }),
                    None => Ok(RunOutput::default()),
                };
            }

            self.seed_calls.borrow_mut().push(options.clone());
            match self.seeds.borrow_mut().pop_front().unwrap_or(Err(false)) {
                Ok(()) => Ok(RunOutput::default()),
                Err(true) => Err(RunError::Interrupted {
                    command: command.to_string(),
                }),
                Err(false) => Err(RunError::Failure {
                    command: command.to_string(),
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: String::new(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::unbounded(Duration::from_millis(3))
    }

    #[test]
    fn test_no_pending_migrations_seeds_once_without_sleeping() {
        let runner = ScriptedRunner::new()
            .status(" [X] 0001_initial")
            .seed_result(Ok(()));
        let sleeper = RecordingSleeper::default();
        let django = DjangoConfig::default();

        let outcome = Seeder::new(&runner, &sleeper, &django)
            .seed(&SeedRequest::default())
            .unwrap();

        assert_eq!(outcome, SeedOutcome::Seeded { attempts: 1 });
        assert_eq!(runner.seed_calls.borrow().len(), 1);
        assert!(sleeper.sleeps.borrow().is_empty());
    }

    #[test]
    fn test_waits_until_migrations_are_applied() {
        let runner = ScriptedRunner::new()
            .status(" [ ] 0002_pending")
            .status(" [ ] 0002_pending")
            .status(" [X] 0002_pending")
            .seed_result(Ok(()));
        let sleeper = RecordingSleeper::default();
        let django = DjangoConfig::default();

        let outcome = Seeder::new(&runner, &sleeper, &django)
            .with_poll_policy(RetryPolicy::unbounded(Duration::from_secs(7)))
            .seed(&SeedRequest::default())
            .unwrap();

        assert_eq!(outcome, SeedOutcome::Seeded { attempts: 1 });
        assert_eq!(*runner.status_calls.borrow(), 3);
        assert_eq!(
            *sleeper.sleeps.borrow(),
            vec![Duration::from_secs(7), Duration::from_secs(7)]
        );
    }

    #[test]
    fn test_status_error_is_fail_open() {
        let runner = ScriptedRunner::new().status_error().seed_result(Ok(()));
        let sleeper = RecordingSleeper::default();
        let django = DjangoConfig::default();

        let outcome = Seeder::new(&runner, &sleeper, &django)
            .seed(&SeedRequest::default())
            .unwrap();

        assert_eq!(outcome, SeedOutcome::Seeded { attempts: 1 });
        assert!(sleeper.sleeps.borrow().is_empty());
    }

    #[test]
    fn test_interruption_returns_without_retry() {
        let runner = ScriptedRunner::new().seed_result(Err(true));
        let sleeper = RecordingSleeper::default();
        let django = DjangoConfig::default();

        let outcome = Seeder::new(&runner, &sleeper, &django)
            .with_retry_policy(fast())
            .seed(&SeedRequest::default())
            .unwrap();

        assert_eq!(outcome, SeedOutcome::Aborted);
        assert_eq!(runner.seed_calls.borrow().len(), 1);
        assert!(sleeper.sleeps.borrow().is_empty());
    }

    #[test]
    fn test_failures_are_retried_after_fixed_delay() {
        let runner = ScriptedRunner::new()
            .seed_result(Err(false))
            .seed_result(Err(false))
            .seed_result(Err(false))
            .seed_result(Ok(()));
        let sleeper = RecordingSleeper::default();
        let django = DjangoConfig::default();

        let outcome = Seeder::new(&runner, &sleeper, &django)
            .with_retry_policy(fast())
            .seed(&SeedRequest::default())
            .unwrap();

        assert_eq!(outcome, SeedOutcome::Seeded { attempts: 4 });
        assert_eq!(runner.seed_calls.borrow().len(), 4);
        assert_eq!(*sleeper.sleeps.borrow(), vec![Duration::from_millis(3); 3]);
    }

    #[test]
    fn test_bounded_retry_policy_exhausts() {
        // No scripted seed results: every attempt fails
        let runner = ScriptedRunner::new();
        let sleeper = RecordingSleeper::default();
        let django = DjangoConfig::default();

        let outcome = Seeder::new(&runner, &sleeper, &django)
            .with_retry_policy(RetryPolicy::bounded(Duration::ZERO, 5))
            .seed(&SeedRequest::default())
            .unwrap();

        assert_eq!(outcome, SeedOutcome::ExhaustedRetries { attempts: 5 });
        assert_eq!(runner.seed_calls.borrow().len(), 5);
        assert_eq!(sleeper.sleeps.borrow().len(), 4);
    }

    #[test]
    fn test_bounded_poll_policy_gives_up() {
        let runner = ScriptedRunner::new()
            .status(" [ ] 0002")
            .status(" [ ] 0002");
        let sleeper = RecordingSleeper::default();
        let django = DjangoConfig::default();

        let outcome = Seeder::new(&runner, &sleeper, &django)
            .with_poll_policy(RetryPolicy::bounded(Duration::ZERO, 2))
            .seed(&SeedRequest::default())
            .unwrap();

        assert_eq!(outcome, SeedOutcome::MigrationsPending { polls: 2 });
        assert!(runner.seed_calls.borrow().is_empty());
    }

    #[test]
    fn test_interrupt_while_waiting_for_migrations() {
        let runner = ScriptedRunner::new().status(" [ ] 0002");
        let sleeper = RecordingSleeper::default();
        let django = DjangoConfig::default();
        let shutdown = ShutdownState::new();
        shutdown.request_shutdown();

        let outcome = Seeder::new(&runner, &sleeper, &django)
            .with_shutdown(shutdown)
            .seed(&SeedRequest::default())
            .unwrap();

        assert_eq!(outcome, SeedOutcome::Aborted);
        assert!(runner.seed_calls.borrow().is_empty());
    }

    #[test]
    fn test_seed_run_uses_pty_and_confirm_responder() {
        let runner = ScriptedRunner::new().seed_result(Ok(()));
        let sleeper = RecordingSleeper::default();
        let django = DjangoConfig::default();

        Seeder::new(&runner, &sleeper, &django)
            .seed(&SeedRequest::default())
            .unwrap();

        let calls = runner.seed_calls.borrow();
        assert!(calls[0].pty);
        assert_eq!(calls[0].responders.len(), 1);
        assert_eq!(calls[0].responders[0].pattern(), CONFIRM_PROMPT);
    }
}
