use super::duration::{deserialize_duration, deserialize_opt_duration};
use crate::port::PortRange;
use crate::registry::RecoveryPolicy;
use crate::supervisor::{RelaunchPolicy, StopMode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command used to start a fetched project when none is configured.
pub const DEFAULT_LAUNCH_COMMAND: &str = "node index.js";

/// Default base URL of the GitHub REST API.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Launcher settings, loaded from `runtime-launcher.yaml`.
///
/// Every field has a default, so an empty file (or no file at all) yields the
/// stock layout: `./projects`, `./registry.json`, `./logs.txt` and ports
/// 9000-9899.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Base directory that holds one sub-directory per fetched project.
    pub projects_dir: PathBuf,
    /// JSON registry of running runtimes.
    pub registry_file: PathBuf,
    /// Shared append-only log for all runtimes.
    pub log_file: PathBuf,
    pub port_range: PortRange,
    /// Shell command run inside the project directory.
    pub launch_command: String,
    pub github: GithubSettings,
    pub recovery: RecoveryPolicy,
    pub relaunch: RelaunchPolicy,
    pub stop: StopSettings,
    pub health: HealthSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            projects_dir: PathBuf::from("projects"),
            registry_file: PathBuf::from("registry.json"),
            log_file: PathBuf::from("logs.txt"),
            port_range: PortRange::default(),
            launch_command: DEFAULT_LAUNCH_COMMAND.to_string(),
            github: GithubSettings::default(),
            recovery: RecoveryPolicy::default(),
            relaunch: RelaunchPolicy::default(),
            stop: StopSettings::default(),
            health: HealthSettings::default(),
        }
    }
}

impl Settings {
    /// Make relative paths absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.projects_dir,
            &mut self.registry_file,
            &mut self.log_file,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn stop_mode(&self) -> StopMode {
        if self.stop.confirm {
            StopMode::Confirm {
                grace_period: self.stop.grace_period,
            }
        } else {
            StopMode::Signal
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GithubSettings {
    pub api_base: String,
    /// Normally injected from `GITHUB_TOKEN`; may also be set in the file.
    pub token: Option<String>,
    /// Ref to download. `None` downloads the default branch.
    pub git_ref: Option<String>,
    /// Upper bound on a whole download. `None` waits indefinitely.
    #[serde(deserialize_with = "deserialize_opt_duration")]
    pub fetch_timeout: Option<Duration>,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            git_ref: None,
            fetch_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StopSettings {
    /// Wait for the process to die (escalating to SIGKILL) before reporting.
    pub confirm: bool,
    #[serde(deserialize_with = "deserialize_duration")]
    pub grace_period: Duration,
}

impl Default for StopSettings {
    fn default() -> Self {
        Self {
            confirm: true,
            grace_period: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthSettings {
    pub path: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            timeout: Duration::from_secs(2),
        }
    }
}
