use super::log_sink::{spawn_capture, SharedLog};
use super::process::{build_command, is_pid_alive, pid_matches_start_time, send_signal, terminate};
use super::{OutputMode, RelaunchPolicy, StopMode};
use crate::config::Settings;
use crate::error::{validate_pid, Error, Result};
use crate::port::{PortAllocator, PortRange};
use crate::registry::{RegistryEntry, RegistryStore, RuntimeSummary};
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How long the exit watcher waits for output capture to drain.
const CAPTURE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How long `shutdown` waits for each exit watcher to finish.
const WATCHER_JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Knobs the supervisor takes from [`Settings`].
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub launch_command: String,
    pub port_range: PortRange,
    pub relaunch: RelaunchPolicy,
    pub stop_mode: StopMode,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for SupervisorOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            launch_command: settings.launch_command.clone(),
            port_range: settings.port_range,
            relaunch: settings.relaunch,
            stop_mode: settings.stop_mode(),
        }
    }
}

/// How a supervised child went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(i32),
    Signaled(i32),
    /// `wait` itself failed; the child is gone but its status is not known.
    Unknown,
}

impl ExitOutcome {
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitOutcome::Exited(code) => Some(*code),
            _ => None,
        }
    }

    /// Line written to the shared log when the child exits.
    pub fn message(&self) -> String {
        match self {
            ExitOutcome::Exited(code) => format!("Process exited with code {}", code),
            ExitOutcome::Signaled(sig) => format!("Process exited with signal {}", sig),
            ExitOutcome::Unknown => "Process exited with unknown status".to_string(),
        }
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => ExitOutcome::Exited(code),
            (None, Some(sig)) => ExitOutcome::Signaled(sig),
            (None, None) => ExitOutcome::Unknown,
        }
    }
}

/// A child launched by this supervisor instance.
struct RuntimeHandle {
    pid: u32,
    exit: watch::Receiver<Option<ExitOutcome>>,
    watcher: JoinHandle<()>,
}

/// Launches, observes and stops runtimes.
///
/// The registry and shared log are owned elsewhere (the composition root) and
/// shared by `Arc`. Handles for children spawned here live in `running`; a
/// `Supervisor` in another process can still stop those children through the
/// registry, it just cannot observe their exit.
///
/// `running` is a `parking_lot::Mutex` and is never held across an `.await`.
pub struct Supervisor {
    store: Arc<RegistryStore>,
    log: Arc<SharedLog>,
    ports: PortAllocator,
    launch_command: String,
    relaunch: RelaunchPolicy,
    stop_mode: StopMode,
    running: Mutex<HashMap<String, RuntimeHandle>>,
}

impl Supervisor {
    pub fn new(store: Arc<RegistryStore>, log: Arc<SharedLog>, options: SupervisorOptions) -> Self {
        Self {
            store,
            log,
            ports: PortAllocator::new(options.port_range),
            launch_command: options.launch_command,
            relaunch: options.relaunch,
            stop_mode: options.stop_mode,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Open the registry and shared log named in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store = RegistryStore::open(settings.registry_file.clone(), settings.recovery)?;
        let log = SharedLog::new(settings.log_file.clone());
        Ok(Self::new(
            Arc::new(store),
            Arc::new(log),
            SupervisorOptions::from(settings),
        ))
    }

    pub fn store(&self) -> &Arc<RegistryStore> {
        &self.store
    }

    pub fn log(&self) -> &Arc<SharedLog> {
        &self.log
    }

    /// Launch the configured command in `dir` under `name`.
    pub async fn launch(&self, name: &str, dir: &Path) -> Result<RegistryEntry> {
        self.launch_with(name, dir, None, OutputMode::Captured).await
    }

    /// Launch `command` (or the configured default) in `dir` under `name`.
    ///
    /// With [`OutputMode::File`] the child writes straight into the shared log
    /// and survives this process; its exit is only observed while this
    /// supervisor is alive.
    #[tracing::instrument(skip(self, name, dir), fields(runtime.name = %name))]
    pub async fn launch_with(
        &self,
        name: &str,
        dir: &Path,
        command: Option<&str>,
        output: OutputMode,
    ) -> Result<RegistryEntry> {
        if !dir.is_dir() {
            return Err(Error::SpawnFailed {
                name: name.to_string(),
                reason: format!("directory '{}' does not exist", dir.display()),
            });
        }

        self.store.load()?;
        if let Some(existing) = self.store.get(name) {
            self.resolve_existing(name, &existing).await?;
        }

        let command = command.unwrap_or(&self.launch_command);
        let port = self.ports.allocate(&self.store.ports_in_use());

        let output_file = match output {
            OutputMode::File => Some(self.log.open_append()?),
            OutputMode::Captured => None,
        };
        let mut child = build_command(command, dir, port, output_file)?
            .spawn()
            .map_err(|e| Error::SpawnFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let pid = child.id().ok_or_else(|| Error::SpawnFailed {
            name: name.to_string(),
            reason: "process exited before its PID could be read".to_string(),
        })?;

        let entry = RegistryEntry::new(pid, port);
        if let Err(e) = self.store.set(name, entry.clone()) {
            tracing::error!("Failed to record '{}' (PID {}), killing it: {}", name, pid, e);
            let _ = child.start_kill();
            return Err(e);
        }

        tracing::info!("Launched '{}' with PID {} on port {}", name, pid, port);
        if output.is_file() {
            let note = format!("Detached with PID {}, output follows unprefixed", pid);
            if let Err(e) = self.log.append(name, &note) {
                tracing::warn!("Failed to log detach of '{}': {}", name, e);
            }
        }

        let mut captures = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            captures.push(spawn_capture(
                self.log.clone(),
                name.to_string(),
                stdout,
                false,
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            captures.push(spawn_capture(
                self.log.clone(),
                name.to_string(),
                stderr,
                true,
            ));
        }

        let (exit_tx, exit_rx) = watch::channel(None);
        let store = self.store.clone();
        let log = self.log.clone();
        let service = name.to_string();

        let watcher = tokio::spawn(async move {
            let outcome = match child.wait().await {
                Ok(status) => ExitOutcome::from(status),
                Err(e) => {
                    tracing::warn!("Failed to wait for '{}' (PID {}): {}", service, pid, e);
                    ExitOutcome::Unknown
                }
            };

            // Grandchildren can hold the pipes open; don't wait on them forever.
            for capture in captures {
                let _ = tokio::time::timeout(CAPTURE_DRAIN_TIMEOUT, capture).await;
            }

            tracing::info!("Runtime '{}' (PID {}): {}", service, pid, outcome.message());
            if let Err(e) = log.append(&service, &outcome.message()) {
                tracing::error!("Failed to log exit of '{}': {}", service, e);
            }
            if let Err(e) = store.delete_if_pid(&service, pid) {
                tracing::error!("Failed to remove '{}' from registry: {}", service, e);
            }

            let _ = exit_tx.send(Some(outcome));
        });

        self.running.lock().insert(
            name.to_string(),
            RuntimeHandle {
                pid,
                exit: exit_rx,
                watcher,
            },
        );

        Ok(entry)
    }

    /// Apply the relaunch policy to an entry already recorded under `name`.
    async fn resolve_existing(&self, name: &str, existing: &RegistryEntry) -> Result<()> {
        let pid = existing.process_id;
        let alive = is_pid_alive(pid)
            && existing
                .started_at_utc()
                .map(|started| pid_matches_start_time(pid, started))
                .unwrap_or(true);

        if !alive {
            tracing::debug!("Dropping stale entry for '{}' (PID {})", name, pid);
            self.store.delete_if_pid(name, pid)?;
            return Ok(());
        }

        match self.relaunch {
            RelaunchPolicy::Reject => Err(Error::AlreadyRunning {
                name: name.to_string(),
                pid,
            }),
            RelaunchPolicy::StopExisting => {
                tracing::info!("Stopping existing '{}' (PID {}) before relaunch", name, pid);
                self.stop_entry(name, existing, true).await
            }
        }
    }

    /// Stop the runtime recorded under `name`.
    ///
    /// Returns `false` without touching the registry when no such entry exists.
    #[tracing::instrument(skip(self, name), fields(runtime.name = %name))]
    pub async fn stop(&self, name: &str) -> Result<bool> {
        self.store.load()?;
        let Some(entry) = self.store.get(name) else {
            return Ok(false);
        };

        let owned = self.owns(name, entry.process_id);
        self.stop_entry(name, &entry, owned).await?;
        Ok(true)
    }

    async fn stop_entry(&self, name: &str, entry: &RegistryEntry, owned: bool) -> Result<()> {
        let pid = entry.process_id;

        if let Err(e) = validate_pid(pid, name) {
            tracing::warn!("Removing '{}' with unusable PID: {}", name, e);
            self.store.delete_if_pid(name, pid)?;
            return Ok(());
        }

        // A pid we did not spawn may have been recycled since it was recorded.
        let reused = !owned
            && entry
                .started_at_utc()
                .map(|started| !pid_matches_start_time(pid, started))
                .unwrap_or(false);

        if reused {
            tracing::warn!(
                "PID {} no longer belongs to '{}', removing entry without signalling",
                pid,
                name
            );
        } else {
            match self.stop_mode {
                StopMode::Signal => {
                    send_signal(pid, name, Signal::SIGTERM)?;
                }
                StopMode::Confirm { grace_period } => {
                    if !terminate(pid, name, grace_period).await? {
                        return Err(Error::StopTimedOut {
                            name: name.to_string(),
                            pid,
                        });
                    }
                }
            }
        }

        // The exit watcher may already have removed it.
        self.store.delete_if_pid(name, pid)?;
        tracing::info!("Stopped '{}' (PID {})", name, pid);
        Ok(())
    }

    fn owns(&self, name: &str, pid: u32) -> bool {
        self.running
            .lock()
            .get(name)
            .map(|handle| handle.pid == pid)
            .unwrap_or(false)
    }

    /// Every recorded runtime, sorted by name.
    pub fn list(&self) -> Vec<RuntimeSummary> {
        self.store
            .snapshot()
            .iter()
            .map(|(name, entry)| RuntimeSummary::from_entry(name, entry))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<RegistryEntry> {
        self.store.get(name)
    }

    /// Wait until the child launched here under `name` exits.
    ///
    /// Returns `None` if this supervisor never launched `name`.
    pub async fn wait_for_exit(&self, name: &str) -> Option<ExitOutcome> {
        let mut exit = {
            let running = self.running.lock();
            running.get(name)?.exit.clone()
        };

        if exit.wait_for(|outcome| outcome.is_some()).await.is_err() {
            tracing::debug!("Exit watcher for '{}' went away without a status", name);
        }
        let outcome = *exit.borrow();
        outcome
    }

    /// Remove entries whose process is no longer alive.
    #[tracing::instrument(skip(self))]
    pub fn prune(&self) -> Result<Vec<String>> {
        self.store.load()?;
        let mut pruned = Vec::new();
        for (name, entry) in self.store.snapshot() {
            if is_pid_alive(entry.process_id) {
                continue;
            }
            if self.store.delete_if_pid(&name, entry.process_id)? {
                tracing::info!("Pruned '{}' (PID {} is gone)", name, entry.process_id);
                pruned.push(name);
            }
        }
        Ok(pruned)
    }

    /// Stop every runtime launched by this supervisor.
    ///
    /// Keeps going after a failure and returns the first error.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        let handles: Vec<(String, RuntimeHandle)> = self.running.lock().drain().collect();
        let mut first_error = None;

        for (name, handle) in handles {
            if let Err(e) = self.store.load() {
                first_error.get_or_insert(e);
            }
            let entry = self
                .store
                .get(&name)
                .filter(|entry| entry.process_id == handle.pid);

            if let Some(entry) = entry {
                if let Err(e) = self.stop_entry(&name, &entry, true).await {
                    tracing::error!("Failed to stop '{}': {}", name, e);
                    first_error.get_or_insert(e);
                    continue;
                }
            }

            if tokio::time::timeout(WATCHER_JOIN_TIMEOUT, handle.watcher)
                .await
                .is_err()
            {
                tracing::warn!("Exit watcher for '{}' did not finish", name);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
