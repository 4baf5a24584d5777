// Container lifecycle tasks

use anyhow::Result;

use super::{join_parts, long_flags, services_arg, TaskContext};
use crate::config::TasksConfig;
use crate::runner::RunOptions;

pub fn down_command() -> String {
    "docker compose down -t0 -v --remove-orphans".to_string()
}

pub fn up_command(config: &TasksConfig) -> String {
    format!("docker compose --profile debug -f {} up -d", config.compose_file)
}

pub fn logs_command(follow: bool, service: &str) -> String {
    join_parts([
        "docker compose logs",
        if follow { "--follow" } else { "" },
        service,
    ])
}

pub fn build_command(config: &TasksConfig, no_cache: bool, services: &str) -> String {
    let compose = format!("docker compose -f {} build", config.compose_file);
    let args = long_flags(&config.docker.build_args);
    let services = services_arg(services);
    join_parts([
        compose.as_str(),
        args.as_str(),
        if no_cache { "--no-cache" } else { "" },
        services.as_str(),
    ])
}

pub fn restart_command(services: &str) -> String {
    let services = services_arg(services);
    join_parts(["docker compose restart -t0", services.as_str()])
}

pub fn bash_command(service: &str, rest: &str) -> String {
    let inner = if rest.is_empty() {
        String::new()
    } else {
        format!("-c \"{}\"", rest)
    };
    join_parts(["docker compose exec", service, "bash", inner.as_str()])
}

pub fn prune_commands() -> [&'static str; 2] {
    ["docker system prune -af --volumes", "docker container prune -f"]
}

/// Stop all the services
pub fn down(ctx: &TaskContext) -> Result<()> {
    ctx.run(&down_command())?;
    Ok(())
}

/// Create and start the containers
pub fn up(ctx: &TaskContext) -> Result<()> {
    ctx.run(&up_command(ctx.config))?;
    Ok(())
}

/// Print the logs of a service
pub fn logs(ctx: &TaskContext, follow: bool, service: Option<&str>) -> Result<()> {
    let service = service.unwrap_or(ctx.config.django.service.as_str());
    ctx.run_pty(&logs_command(follow, service))?;
    Ok(())
}

/// Build the images
pub fn build(ctx: &TaskContext, no_cache: bool, services: &str) -> Result<()> {
    ctx.run_pty(&build_command(ctx.config, no_cache, services))?;
    Ok(())
}

/// Restart services, all of them by default
pub fn restart(ctx: &TaskContext, services: &str) -> Result<()> {
    ctx.run_pty(&restart_command(services))?;
    Ok(())
}

/// Open bash in a service, or run `rest` through it
pub fn bash(ctx: &TaskContext, service: Option<&str>, rest: &str, hide: bool) -> Result<()> {
    let service = service.unwrap_or(ctx.config.django.service.as_str());
    let options = RunOptions::new().pty().with_hide(hide);
    ctx.run_with(&bash_command(service, rest), &options)?;
    Ok(())
}

/// Feed a script to the management shell
pub fn script(ctx: &TaskContext, script: &str) -> Result<()> {
    let rest = format!("{} ./manage.py shell < {}", ctx.config.django.executor, script);
    bash(ctx, None, &rest, false)
}

/// Remove unused images, containers, networks and volumes
pub fn docker_prune(ctx: &TaskContext) -> Result<()> {
    for command in prune_commands() {
        ctx.run(command)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::RecordingRunner;
    use crate::shutdown::ShutdownState;

    #[test]
    fn test_up_uses_compose_file() {
        let mut config = TasksConfig::default();
        config.compose_file = "compose.local.yml".to_string();
        assert_eq!(
            up_command(&config),
            "docker compose --profile debug -f compose.local.yml up -d"
        );
    }

    #[test]
    fn test_build_command() {
        let mut config = TasksConfig::default();
        config.docker.build_args = vec!["pull".to_string(), "parallel".to_string()];

        assert_eq!(
            build_command(&config, true, "django,celery"),
            "docker compose -f docker-compose.dev.yml build --pull --parallel --no-cache django celery"
        );
        assert_eq!(
            build_command(&TasksConfig::default(), false, ""),
            "docker compose -f docker-compose.dev.yml build"
        );
    }

    #[test]
    fn test_logs_and_restart() {
        assert_eq!(logs_command(true, "django"), "docker compose logs --follow django");
        assert_eq!(logs_command(false, "db"), "docker compose logs db");
        assert_eq!(restart_command(""), "docker compose restart -t0");
        assert_eq!(restart_command("django,db"), "docker compose restart -t0 django db");
    }

    #[test]
    fn test_bash_command() {
        assert_eq!(bash_command("django", ""), "docker compose exec django bash");
        assert_eq!(
            bash_command("django", "ls -la"),
            "docker compose exec django bash -c \"ls -la\""
        );
    }

    #[test]
    fn test_bash_runs_a_single_pty_command() {
        let config = TasksConfig::default();
        let runner = RecordingRunner::default();
        let ctx = TaskContext::new(&config, &runner, ".", ShutdownState::new());

        bash(&ctx, Some("celery"), "", true).unwrap();

        assert_eq!(runner.commands(), vec!["docker compose exec celery bash"]);
        let calls = runner.calls.borrow();
        assert!(calls[0].1.pty);
        assert!(calls[0].1.hide);
    }

    #[test]
    fn test_script_runs_through_bash() {
        let config = TasksConfig::default();
        let runner = RecordingRunner::default();
        let ctx = TaskContext::new(&config, &runner, ".", ShutdownState::new());

        script(&ctx, "scripts/fix.py").unwrap();

        assert_eq!(
            runner.commands(),
            vec!["docker compose exec django bash -c \"/entrypoint.sh ./manage.py shell < scripts/fix.py\""]
        );
        assert!(runner.calls.borrow()[0].1.pty);
    }

    #[test]
    fn test_docker_prune_runs_both() {
        let config = TasksConfig::default();
        let runner = RecordingRunner::default();
        let ctx = TaskContext::new(&config, &runner, ".", ShutdownState::new());

        docker_prune(&ctx).unwrap();

        assert_eq!(runner.commands(), prune_commands().to_vec());
    }
}
