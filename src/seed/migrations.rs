// Pending migration detection

use crate::config::DjangoConfig;
use crate::runner::{CommandRunner, RunOptions};

/// `showmigrations` prints `[ ]` in front of every migration not yet applied
pub const UNAPPLIED_MARKER: &str = "[ ]";

/// Whether `showmigrations` output lists at least one unapplied migration
pub fn has_unapplied(output: &str) -> bool {
    output.contains(UNAPPLIED_MARKER)
}

/// Command that lists migrations inside the web container
pub fn showmigrations_command(django: &DjangoConfig) -> String {
    format!(
        "{} bash -c 'python manage.py showmigrations'",
        django.exec_prefix()
    )
}

/// Check if there are unapplied migrations.
///
/// Errors while querying count as "nothing pending": a stopped container
/// should not block seeding forever.
pub fn unapplied_migrations(runner: &dyn CommandRunner, django: &DjangoConfig) -> bool {
    let command = showmigrations_command(django);
    match runner.run(&command, &RunOptions::new().hidden()) {
        Ok(output) => has_unapplied(&output.stdout),
        Err(e) => {
            println!("Error showing unapplied migrations: {}", e);
            log::warn!("Migration status query failed, assuming none pending: {}", e);
            false
        }
    }
}
