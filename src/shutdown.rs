// Ctrl+C and termination signals for long-running tasks
//
// Signals never kill devtasks directly. They raise a shared flag, and the
// runner and the seeding loop notice it, stop the child and return.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of `wait` while no interrupt arrives
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Interrupt flag shared by the signal thread, the runner and the seeder
#[derive(Clone, Debug, Default)]
pub struct ShutdownState {
    interrupted: Arc<AtomicBool>,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag; every clone observes it
    pub fn request_shutdown(&self) {
        if !self.interrupted.swap(true, Ordering::SeqCst) {
            log::info!("Interrupt received, stopping the current task");
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Block for `duration` or until the flag is raised.
    /// Returns true when the wait was cut short by an interrupt.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_shutdown_requested() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(WAIT_SLICE.min(deadline - now));
        }
    }
}

#[cfg(unix)]
fn signal_name(signal: i32) -> &'static str {
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};

    match signal {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        SIGHUP => "SIGHUP",
        _ => "signal",
    }
}

/// Route SIGINT, SIGTERM and SIGHUP to `state` from a background thread
#[cfg(unix)]
pub fn register_signal_handlers(state: ShutdownState) -> Result<()> {
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])
        .map_err(|e| anyhow!("Failed to install signal handlers: {}", e))?;

    thread::Builder::new()
        .name("devtasks-signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                log::debug!("Caught {}", signal_name(signal));
                state.request_shutdown();
            }
        })
        .map_err(|e| anyhow!("Failed to start signal thread: {}", e))?;

    Ok(())
}

/// Route Ctrl+C to `state`
#[cfg(windows)]
pub fn register_signal_handlers(state: ShutdownState) -> Result<()> {
    ctrlc::set_handler(move || state.request_shutdown())
        .map_err(|e| anyhow!("Failed to install Ctrl+C handler: {}", e))
}
