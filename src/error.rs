// Allow unused_assignments at module level because thiserror's generated code
// for struct variants triggers false positive warnings - the fields ARE used
// in the Display impl but rustc's lint pass doesn't see this.
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(rtl::config::error))]
    Config(String),

    #[error("Fetch failed: {status} {reason}")]
    #[diagnostic(
        code(rtl::fetch::status),
        help("Check that the repository exists and that GITHUB_TOKEN can read it")
    )]
    Fetch { status: u16, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    #[diagnostic(code(rtl::fetch::archive))]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Registry file '{}' is corrupt: {reason}", .path.display())]
    #[diagnostic(
        code(rtl::registry::corrupt),
        help("Fix or remove the registry file, or set `recovery: empty` to start from an empty registry")
    )]
    RegistryCorrupt { path: PathBuf, reason: String },

    #[error("Runtime '{name}' failed to start: {reason}")]
    #[diagnostic(
        code(rtl::runtime::spawn_failed),
        help("Check that the launch command exists inside the project directory")
    )]
    SpawnFailed { name: String, reason: String },

    #[error("Runtime '{name}' is already running (PID {pid})")]
    #[diagnostic(code(rtl::runtime::already_running), help("Stop the running instance first"))]
    AlreadyRunning { name: String, pid: u32 },

    #[error("Runtime '{name}' (PID {pid}) did not exit after SIGTERM and SIGKILL")]
    #[diagnostic(code(rtl::runtime::stop_timeout))]
    StopTimedOut { name: String, pid: u32 },

    #[error("Invalid PID {pid}: {reason}")]
    InvalidPid { pid: u32, reason: String },

    #[error("Runtime not found: {0}")]
    #[diagnostic(code(rtl::runtime::not_found), help("List tracked runtimes with `rtl list`"))]
    ServiceNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::Config(msg) if msg.contains("GITHUB_TOKEN") => Some(
                "Export a token with repository read access: export GITHUB_TOKEN=ghp_...".to_string(),
            ),
            Error::Fetch { status: 401, .. } | Error::Fetch { status: 403, .. } => Some(
                "The token was rejected. Check that GITHUB_TOKEN is valid and has the `repo` scope."
                    .to_string(),
            ),
            Error::Fetch { status: 404, .. } => Some(
                "Repository or ref not found. Private repositories return 404 when the token lacks access."
                    .to_string(),
            ),
            Error::RegistryCorrupt { path, .. } => Some(format!(
                "Move the broken file aside and retry:\n  mv {} {}.bak",
                path.display(),
                path.display()
            )),
            Error::SpawnFailed { name, .. } => Some(format!(
                "Check the runtime output with: rtl logs {}",
                name
            )),
            Error::AlreadyRunning { name, .. } => {
                Some(format!("Stop the running instance with: rtl stop {}", name))
            }
            Error::StopTimedOut { pid, .. } => Some(format!(
                "The process may be stuck in uninterruptible I/O. Inspect it with: ps -o pid,stat,cmd -p {}",
                pid
            )),
            Error::ServiceNotFound(_) => Some("List tracked runtimes with: rtl list".to_string()),
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}

/// Validates and converts a u32 PID to nix::unistd::Pid safely.
/// Returns Err for PID 0 (process group), PID 1 (init), or values > i32::MAX.
pub fn validate_pid(pid: u32, name: &str) -> Result<nix::unistd::Pid> {
    if pid == 0 {
        return Err(Error::InvalidPid {
            pid,
            reason: format!(
                "PID 0 is invalid for runtime '{}' (refers to process group, not a process)",
                name
            ),
        });
    }
    if pid == 1 {
        return Err(Error::InvalidPid {
            pid,
            reason: format!("refusing to signal PID 1 (init) for runtime '{}'", name),
        });
    }
    if pid > i32::MAX as u32 {
        return Err(Error::InvalidPid {
            pid,
            reason: format!("PID exceeds i32::MAX for runtime '{}'", name),
        });
    }
    Ok(nix::unistd::Pid::from_raw(pid as i32))
}

/// Same as validate_pid but for read-only existence checks.
pub fn validate_pid_for_check(pid: u32) -> Option<nix::unistd::Pid> {
    if pid == 0 || pid > i32::MAX as u32 {
        return None;
    }
    Some(nix::unistd::Pid::from_raw(pid as i32))
}
