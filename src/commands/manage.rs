// Management command tasks

use anyhow::Result;

use super::{join_parts, long_flags, TaskContext};
use crate::config::{DjangoConfig, TasksConfig};

/// Executor used when tests run under coverage
pub const COVERAGE_EXECUTOR: &str = "coverage run";

/// Top-level packages of a comma-separated test selection
pub fn tests_roots(tests: &str) -> Vec<String> {
    tests
        .split(',')
        .map(|test| {
            let path = test.replace('.', "/");
            path.split('/').next().unwrap_or_default().to_string()
        })
        .collect()
}

/// Dotted test labels from a selection written with `.` or `/`
pub fn selected_tests(tests: &str) -> Vec<String> {
    tests
        .split(',')
        .map(|test| {
            let dotted = test.replace('/', ".");
            let label = dotted.strip_suffix(".py").unwrap_or(&dotted);
            label.trim_end_matches('.').to_string()
        })
        .collect()
}

pub fn test_command(config: &TasksConfig, tests: &str, keywords: &str, coverage: bool) -> String {
    let executor = if coverage {
        COVERAGE_EXECUTOR
    } else {
        config.django.executor.as_str()
    };
    let flags = long_flags(&config.test.flags);
    let labels = selected_tests(tests).join(" ");
    let keywords = if keywords.is_empty() {
        String::new()
    } else {
        format!("-k {}", keywords)
    };

    let args = join_parts(["test", flags.as_str(), labels.as_str(), keywords.as_str()]);
    config.django.manage_with(executor, &args)
}

pub fn coverage_command(django: &DjangoConfig, tests: &str) -> String {
    let exec = django.exec_prefix();
    format!(
        "{exec} coverage combine; {exec} coverage report --include='{}/*'",
        tests_roots(tests).join("/*,")
    )
}

pub fn makemigrations_command(merge: bool) -> &'static str {
    if merge {
        "makemigrations --merge"
    } else {
        "makemigrations"
    }
}

pub fn makemessages_command() -> &'static str {
    "django-admin makemessages -l en --ignore venv -e py"
}

pub fn compilemessages_command() -> &'static str {
    "django-admin compilemessages --ignore venv"
}

/// Run a management command in the web container
pub fn command(ctx: &TaskContext, command: &str, executor: Option<&str>) -> Result<()> {
    let django = &ctx.config.django;
    let line = match executor {
        Some(executor) => django.manage_with(executor, command),
        None => django.manage(command),
    };
    ctx.run_pty(&line)?;
    Ok(())
}

/// Run tests, optionally under coverage
pub fn test(ctx: &TaskContext, tests: &str, keywords: &str, coverage: bool) -> Result<()> {
    ctx.run_pty(&test_command(ctx.config, tests, keywords, coverage))?;
    if coverage {
        ctx.run_pty(&coverage_command(&ctx.config.django, tests))?;
    }
    Ok(())
}

pub fn makemigrations(ctx: &TaskContext, merge: bool) -> Result<()> {
    command(ctx, makemigrations_command(merge), None)
}

pub fn showmigrations(ctx: &TaskContext) -> Result<()> {
    command(ctx, "showmigrations", None)
}

/// Show the SQL of a migration
pub fn sqlmigrate(ctx: &TaskContext, migration: &str) -> Result<()> {
    command(ctx, &format!("sqlmigrate {}", migration), None)
}

/// Apply migrations, up to `migration` when given (e.g. `clinic 0145`)
pub fn migrate(ctx: &TaskContext, migration: &str) -> Result<()> {
    command(ctx, &format!("migrate {}", migration), None)
}

pub fn shell(ctx: &TaskContext) -> Result<()> {
    command(ctx, "shell", None)
}

pub fn merge(ctx: &TaskContext) -> Result<()> {
    command(ctx, "merge_patients", None)
}

/// Update the messages file
pub fn makemessages(ctx: &TaskContext) -> Result<()> {
    ctx.run(makemessages_command())?;
    Ok(())
}

/// Compile the messages file
pub fn compilemessages(ctx: &TaskContext) -> Result<()> {
    ctx.run(compilemessages_command())?;
    Ok(())
}

pub fn translate(ctx: &TaskContext) -> Result<()> {
    makemessages(ctx)?;
    compilemessages(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::RecordingRunner;
    use crate::shutdown::ShutdownState;

    #[test]
    fn test_tests_roots() {
        assert_eq!(tests_roots("a.b.c,d/e"), vec!["a", "d"]);
        assert_eq!(tests_roots("clinic"), vec!["clinic"]);
    }

    #[test]
    fn test_selected_tests() {
        assert_eq!(
            selected_tests("clinic/tests/test_views.py,billing.tests."),
            vec!["clinic.tests.test_views", "billing.tests"]
        );
        assert_eq!(selected_tests("clinic.tests"), vec!["clinic.tests"]);
    }

    #[test]
    fn test_test_command() {
        let mut config = TasksConfig::default();
        config.test.flags = vec!["parallel".to_string()];

        assert_eq!(
            test_command(&config, "clinic/tests/test_views.py", "", false),
            "docker compose exec django /entrypoint.sh ./manage.py test --parallel clinic.tests.test_views"
        );
        assert_eq!(
            test_command(&config, "clinic.tests,billing", "slow", true),
            "docker compose exec django coverage run ./manage.py test --parallel clinic.tests billing -k slow"
        );
    }

    #[test]
    fn test_coverage_command() {
        assert_eq!(
            coverage_command(&DjangoConfig::default(), "clinic.tests,billing/tests"),
            "docker compose exec django coverage combine; docker compose exec django coverage report --include='clinic/*,billing/*'"
        );
    }

    #[test]
    fn test_coverage_runs_report() {
        let config = TasksConfig::default();
        let runner = RecordingRunner::default();
        let ctx = TaskContext::new(&config, &runner, ".", ShutdownState::new());

        test(&ctx, "clinic", "", true).unwrap();
        let commands = runner.commands();
        assert_eq!(commands.len(), 2);
        assert!(commands[1].contains("coverage report"));
    }

    #[test]
    fn test_command_executor_override() {
        let config = TasksConfig::default();
        let runner = RecordingRunner::default();
        let ctx = TaskContext::new(&config, &runner, ".", ShutdownState::new());

        command(&ctx, "check", Some("python")).unwrap();
        makemigrations(&ctx, true).unwrap();
        migrate(&ctx, "").unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "docker compose exec django python ./manage.py check",
                "docker compose exec django /entrypoint.sh ./manage.py makemigrations --merge",
                "docker compose exec django /entrypoint.sh ./manage.py migrate",
            ]
        );
    }

    #[test]
    fn test_translate_runs_both_message_tasks() {
        let config = TasksConfig::default();
        let runner = RecordingRunner::default();
        let ctx = TaskContext::new(&config, &runner, ".", ShutdownState::new());

        translate(&ctx).unwrap();

        assert_eq!(
            runner.commands(),
            vec![makemessages_command(), compilemessages_command()]
        );
    }
}
