use clap::{Parser, Subcommand};
use std::path::PathBuf;

use devtasks_lib::commands::{self, TaskContext};
use devtasks_lib::config::load_config;
use devtasks_lib::runner::ShellRunner;
use devtasks_lib::seed::{SeedOutcome, SeedRequest, DEFAULT_CRM_DATA_DAY_COUNT, DEFAULT_PATIENT_COUNT, DEFAULT_RPM_DATA_DAY_COUNT};
use devtasks_lib::shutdown::{register_signal_handlers, ShutdownState};

/// devtasks - developer tasks for the docker compose Django environment
#[derive(Parser, Debug)]
#[command(name = "devtasks")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(long, global = true, env = "DEVTASKS_ROOT")]
    root: Option<PathBuf>,

    /// Config file used instead of `<root>/devtasks.yaml`
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    task: Task,
}

#[derive(Subcommand, Debug)]
enum Task {
    /// Stop all the services
    Down,
    /// Create and start the containers
    Up,
    /// Run a Django management command
    Command {
        /// Command run by manage.py
        #[arg(short, long, default_value = "")]
        command: String,
        /// Program running manage.py (defaults to the configured executor)
        #[arg(short, long)]
        executor: Option<String>,
    },
    /// Check if there are migrations to be applied
    Checkmigrations,
    /// Reset and fill the db with sample data
    Db {
        #[command(flatten)]
        seed: SeedArgs,
        /// Give up after this many failed seeding attempts
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Print the logs of a service
    Logs {
        /// Keep streaming new output
        #[arg(short, long)]
        follow: bool,
        /// Service whose logs are printed (defaults to the Django service)
        #[arg(short, long)]
        service: Option<String>,
    },
    /// Build the images
    Build {
        /// Ignore the build cache
        #[arg(short, long)]
        no_cache: bool,
        /// Services to build, comma-separated (all by default)
        #[arg(short, long, default_value = "")]
        service: String,
    },
    /// Run unit tests
    Test {
        /// Tests to run, with . or / as delimiter; separate several with commas
        #[arg(short, long)]
        test: String,
        /// Keywords filtering the tests
        #[arg(short, long, default_value = "")]
        keywords: String,
        /// Run under coverage and print the report
        #[arg(short, long)]
        coverage: bool,
    },
    /// Create new migrations
    Makemigrations {
        /// Merge conflicting migrations
        #[arg(short, long)]
        merge: bool,
    },
    /// List migrations and their status
    Showmigrations,
    /// Show the SQL of a migration
    Sqlmigrate { migration: String },
    /// Apply migrations
    Migrate {
        /// Target migration, e.g. "clinic 0145"
        #[arg(short, long, default_value = "")]
        migration: String,
    },
    /// Update the messages file
    Makemessages,
    /// Compile the messages file
    Compilemessages,
    /// Run makemessages and compilemessages
    Translate,
    /// Invoke bash in a service
    Bash {
        /// Service to enter (defaults to the Django service)
        #[arg(short, long)]
        service: Option<String>,
        /// Command run with `bash -c`
        #[arg(short, long, default_value = "")]
        rest: String,
        /// Do not echo output
        #[arg(long)]
        hide: bool,
    },
    /// Back up configured files, clean the repository and restore them
    Clean {
        /// Do not require every file to belong to the current user
        #[arg(long)]
        skip_ownership_check: bool,
    },
    /// Relaunch the environment and fill the db with sample data
    Reset,
    /// Restart services (all by default)
    Restart {
        /// Services to restart, comma-separated
        #[arg(short, long, default_value = "")]
        service: String,
    },
    /// Invoke the Django shell
    Shell,
    /// Run a script through the Django shell
    Script {
        /// Path relative to the Django project folder
        script: String,
    },
    /// Merge duplicated patients
    Merge,
    /// Remove unused images, containers, networks and volumes
    DockerPrune,
    /// Print the effective configuration
    Config {
        /// JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args, Debug)]
struct SeedArgs {
    /// Number of patients to create
    #[arg(long, default_value_t = DEFAULT_PATIENT_COUNT)]
    patient_count: u32,
    /// Days of CRM data to create
    #[arg(long, default_value_t = DEFAULT_CRM_DATA_DAY_COUNT)]
    crm_data_day_count: u32,
    /// Days of RPM data to create
    #[arg(long, default_value_t = DEFAULT_RPM_DATA_DAY_COUNT)]
    rpm_data_day_count: u32,
    /// Keep the current database contents
    #[arg(long)]
    skip_db_wipe: bool,
    /// Keep base data when wiping
    #[arg(long)]
    keep_base_data: bool,
    /// Profile the seeding command
    #[arg(long)]
    profile: bool,
}

impl From<SeedArgs> for SeedRequest {
    fn from(args: SeedArgs) -> Self {
        SeedRequest {
            patient_count: args.patient_count,
            crm_data_day_count: args.crm_data_day_count,
            rpm_data_day_count: args.rpm_data_day_count,
            skip_db_wipe: args.skip_db_wipe,
            keep_base_data: args.keep_base_data,
            profile: args.profile,
        }
    }
}

impl Task {
    /// External program the task shells out to
    fn required_tool(&self) -> Option<&'static str> {
        match self {
            Task::Clean { .. } | Task::Config { .. } => None,
            Task::Makemessages | Task::Compilemessages | Task::Translate => Some("django-admin"),
            _ => Some("docker"),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logger
    env_logger::init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let root = devtasks_lib::project_root(cli.root.as_deref())?;
    let config_file = cli
        .config
        .as_deref()
        .map(|p| devtasks_lib::resolve_path(&root, p));
    let config = load_config(&root, config_file.as_deref())?;

    if let Some(tool) = cli.task.required_tool() {
        commands::ensure_tool(tool)?;
    }

    let shutdown = ShutdownState::new();
    if let Err(e) = register_signal_handlers(shutdown.clone()) {
        log::warn!("Failed to register signal handlers: {}", e);
    }

    let runner = ShellRunner::new(shutdown.clone()).with_cwd(&root);
    let ctx = TaskContext::new(&config, &runner, root, shutdown);

    match cli.task {
        Task::Down => commands::down(&ctx),
        Task::Up => commands::up(&ctx),
        Task::Command { command, executor } => {
            commands::command(&ctx, &command, executor.as_deref())
        }
        Task::Checkmigrations => commands::checkmigrations(&ctx).map(|_| ()),
        Task::Db { seed, max_attempts } => {
            let outcome = commands::db(&ctx, &seed.into(), max_attempts)?;
            report_seed(outcome);
            Ok(())
        }
        Task::Logs { follow, service } => commands::logs(&ctx, follow, service.as_deref()),
        Task::Build { no_cache, service } => commands::build(&ctx, no_cache, &service),
        Task::Test {
            test,
            keywords,
            coverage,
        } => commands::test(&ctx, &test, &keywords, coverage),
        Task::Makemigrations { merge } => commands::makemigrations(&ctx, merge),
        Task::Showmigrations => commands::showmigrations(&ctx),
        Task::Sqlmigrate { migration } => commands::sqlmigrate(&ctx, &migration),
        Task::Migrate { migration } => commands::migrate(&ctx, &migration),
        Task::Makemessages => commands::makemessages(&ctx),
        Task::Compilemessages => commands::compilemessages(&ctx),
        Task::Translate => commands::translate(&ctx),
        Task::Bash {
            service,
            rest,
            hide,
        } => commands::bash(&ctx, service.as_deref(), &rest, hide),
        Task::Clean {
            skip_ownership_check,
        } => {
            let report = commands::clean(&ctx, skip_ownership_check)?;
            log::info!(
                "Restored {} entries, removed {}",
                report.restored.len(),
                report.removed
            );
            Ok(())
        }
        Task::Reset => {
            report_seed(commands::reset(&ctx)?);
            Ok(())
        }
        Task::Restart { service } => commands::restart(&ctx, &service),
        Task::Shell => commands::shell(&ctx),
        Task::Script { script } => commands::script(&ctx, &script),
        Task::Merge => commands::merge(&ctx),
        Task::DockerPrune => commands::docker_prune(&ctx),
        Task::Config { json } => commands::show_config(&ctx, json),
    }
}

fn report_seed(outcome: SeedOutcome) {
    match outcome {
        SeedOutcome::Aborted => println!("Seeding aborted"),
        SeedOutcome::Seeded { attempts } if attempts > 1 => {
            log::info!("Seeded after {} attempts", attempts)
        }
        _ => {}
    }
}
