//! Child-process lifecycle: launch, observe, stop.
//!
//! A [`Supervisor`] owns the [`RegistryStore`](crate::registry::RegistryStore)
//! and the [`SharedLog`]. Every launched runtime gets a port from the
//! [`PortAllocator`](crate::port::PortAllocator), a registry entry, two output
//! capture tasks and an exit watcher. The watcher removes the entry and
//! records the exit code in the shared log when the child goes away.

mod core;
mod log_sink;
mod process;

pub use self::core::{ExitOutcome, Supervisor, SupervisorOptions};
pub use log_sink::SharedLog;
pub use process::is_pid_alive;

use serde::Deserialize;
use std::time::Duration;

/// What `launch` does when the name is already registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelaunchPolicy {
    /// Stop the existing runtime, then start the new one.
    #[default]
    StopExisting,
    /// Fail with `AlreadyRunning` while the existing pid is alive.
    Reject,
}

/// Where a runtime's stdout and stderr go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Piped through capture tasks that prefix each line in the shared log.
    /// The child depends on this process staying alive to read its output.
    #[default]
    Captured,
    /// Appended unprefixed to the shared log file by the child itself, so it
    /// keeps running after this process exits.
    File,
}

impl OutputMode {
    pub fn is_file(&self) -> bool {
        matches!(self, OutputMode::File)
    }
}

/// How `stop` waits for a runtime to go away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Send SIGTERM and return immediately.
    Signal,
    /// SIGTERM, wait up to `grace_period`, then SIGKILL.
    Confirm { grace_period: Duration },
}

impl Default for StopMode {
    fn default() -> Self {
        StopMode::Confirm {
            grace_period: Duration::from_secs(5),
        }
    }
}
