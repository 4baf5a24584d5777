// Seeding, reclaim and configuration tasks

use anyhow::{anyhow, Result};
use std::time::Duration;

use super::compose::{down, up};
use super::TaskContext;
use crate::config::TasksConfig;
use crate::reclaim::{default_permission_check, BackupManifest, ReclaimReport, Reclaimer};
use crate::seed::{unapplied_migrations, RetryPolicy, SeedOutcome, SeedRequest, Seeder, Sleeper};

/// Print whether migrations are pending
pub fn checkmigrations(ctx: &TaskContext) -> Result<bool> {
    let pending = unapplied_migrations(ctx.runner, &ctx.config.django);
    if pending {
        println!("There are unapplied migrations");
    } else {
        println!("All migrations have been applied");
    }
    Ok(pending)
}

/// Poll and retry policies from the configuration
pub fn seed_policies(config: &TasksConfig, max_attempts: Option<u32>) -> (RetryPolicy, RetryPolicy) {
    let poll = RetryPolicy::unbounded(Duration::from_secs(config.seconds_sleep));
    let delay = Duration::from_millis(config.seed_retry_delay_ms);
    let retry = match max_attempts {
        Some(max) => RetryPolicy::bounded(delay, max),
        None => RetryPolicy::unbounded(delay),
    };
    (poll, retry)
}

/// Reset and fill the database with sample data; waits end early on Ctrl+C
pub fn db(ctx: &TaskContext, request: &SeedRequest, max_attempts: Option<u32>) -> Result<SeedOutcome> {
    db_with_sleeper(ctx, request, max_attempts, &ctx.shutdown)
}

pub fn db_with_sleeper(
    ctx: &TaskContext,
    request: &SeedRequest,
    max_attempts: Option<u32>,
    sleeper: &dyn Sleeper,
) -> Result<SeedOutcome> {
    let (poll, retry) = seed_policies(ctx.config, max_attempts);
    let outcome = Seeder::new(ctx.runner, sleeper, &ctx.config.django)
        .with_poll_policy(poll)
        .with_retry_policy(retry)
        .with_shutdown(ctx.shutdown.clone())
        .seed(request)?;

    match outcome {
        SeedOutcome::Seeded { .. } | SeedOutcome::Aborted => Ok(outcome),
        SeedOutcome::ExhaustedRetries { attempts } => {
            Err(anyhow!("Seeding failed after {} attempts", attempts))
        }
        SeedOutcome::MigrationsPending { polls } => Err(anyhow!(
            "Migrations still pending after {} checks",
            polls
        )),
    }
}

/// Relaunch the containers and seed with defaults
pub fn reset(ctx: &TaskContext) -> Result<SeedOutcome> {
    down(ctx)?;
    up(ctx)?;
    db(ctx, &SeedRequest::default(), None)
}

/// Back up, clean and restore the project tree
pub fn clean(ctx: &TaskContext, skip_ownership_check: bool) -> Result<ReclaimReport> {
    if skip_ownership_check {
        log::warn!("Ownership check disabled");
    }
    let manifest = BackupManifest::from_config(&ctx.config.clean_env, ctx.root());
    let report = Reclaimer::new(ctx.root(), manifest)
        .with_permission_check(default_permission_check(skip_ownership_check))
        .reclaim()?;
    Ok(report)
}

/// Render the effective configuration
pub fn render_config(config: &TasksConfig, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(config)?)
    } else {
        Ok(serde_yaml::to_string(config)?)
    }
}

pub fn show_config(ctx: &TaskContext, json: bool) -> Result<()> {
    println!("{}", render_config(ctx.config, json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::RecordingRunner;
    use crate::shutdown::ShutdownState;

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration) {}
    }

    #[test]
    fn test_checkmigrations() {
        let config = TasksConfig::default();
        let runner = RecordingRunner::with_stdout("clinic\n [ ] 0002_field\n");
        let ctx = TaskContext::new(&config, &runner, ".", ShutdownState::new());
        assert!(checkmigrations(&ctx).unwrap());

        let runner = RecordingRunner::with_stdout("clinic\n [X] 0002_field\n");
        let ctx = TaskContext::new(&config, &runner, ".", ShutdownState::new());
        assert!(!checkmigrations(&ctx).unwrap());
    }

    #[test]
    fn test_seed_policies_follow_config() {
        let mut config = TasksConfig::default();
        config.seconds_sleep = 3;
        config.seed_retry_delay_ms = 250;

        let (poll, retry) = seed_policies(&config, Some(4));
        assert_eq!(poll.delay, Duration::from_secs(3));
        assert_eq!(poll.max_attempts, None);
        assert_eq!(retry.delay, Duration::from_millis(250));
        assert_eq!(retry.max_attempts, Some(4));
    }

    #[test]
    fn test_db_runs_refresh_db() {
        let config = TasksConfig::default();
        let runner = RecordingRunner::with_stdout(" [X] 0001_initial");
        let ctx = TaskContext::new(&config, &runner, ".", ShutdownState::new());

        let request = SeedRequest {
            patient_count: 5,
            skip_db_wipe: true,
            ..Default::default()
        };
        let outcome = db_with_sleeper(&ctx, &request, None, &NoSleep).unwrap();

        assert_eq!(outcome, SeedOutcome::Seeded { attempts: 1 });
        let commands = runner.commands();
        assert_eq!(
            commands[1],
            "docker compose exec django /entrypoint.sh ./manage.py refresh_db --patient_count 5 --crm_data_day_count 100 --rpm_data_day_count 100 --skip_db_wipe --confirm"
        );
    }

    #[test]
    fn test_reset_runs_down_up_then_seed() {
        let config = TasksConfig::default();
        let runner = RecordingRunner::default();
        let ctx = TaskContext::new(&config, &runner, ".", ShutdownState::new());

        reset(&ctx).unwrap();

        let commands = runner.commands();
        assert!(commands[0].starts_with("docker compose down"));
        assert!(commands[1].contains("up -d"));
        assert!(commands[2].contains("showmigrations"));
        assert!(commands[3].contains("refresh_db"));
    }

    #[test]
    fn test_render_config() {
        let config = TasksConfig::default();
        let json = render_config(&config, true).unwrap();
        assert!(json.contains("\"composeFile\": \"docker-compose.dev.yml\""));

        let yaml = render_config(&config, false).unwrap();
        assert!(yaml.contains("composeFile: docker-compose.dev.yml"));
    }
}
