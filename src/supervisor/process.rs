//! OS-level helpers: building the child command, signalling and probing pids.

use crate::error::{validate_pid, validate_pid_for_check, Result};
use chrono::{DateTime, Utc};
use nix::errno::Errno;
use nix::sys::signal::{self, killpg, Signal};
use std::fs::File;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Interval between liveness probes while waiting for a process to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait after SIGKILL before giving up.
const KILL_WAIT: Duration = Duration::from_secs(2);

/// Build the command that runs `launch_command` inside `dir` with `PORT` set.
///
/// The command goes through `bash -c "exec ..."` so shell syntax works while
/// the recorded pid is still the long-running process itself. The child gets
/// its own process group so that stop can signal the whole tree.
///
/// With `output_file` set, stdout and stderr both write to that file instead
/// of pipes, so the child does not depend on anyone reading its output.
pub(crate) fn build_command(
    launch_command: &str,
    dir: &Path,
    port: u16,
    output_file: Option<File>,
) -> Result<Command> {
    let mut cmd = Command::new("/bin/bash");
    cmd.arg("-c")
        .arg(format!("exec {}", launch_command))
        .current_dir(dir)
        .env("PORT", port.to_string())
        .stdin(Stdio::null());

    match output_file {
        Some(file) => {
            cmd.stdout(Stdio::from(file.try_clone()?))
                .stderr(Stdio::from(file));
        }
        None => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
    }

    // Don't kill on drop to support detach mode
    cmd.kill_on_drop(false).process_group(0);
    Ok(cmd)
}

/// Whether `pid` refers to a live (non-zombie) process.
pub fn is_pid_alive(pid: u32) -> bool {
    let Some(nix_pid) = validate_pid_for_check(pid) else {
        return false;
    };

    let exists = match signal::kill(nix_pid, None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        // Permission denied means it exists
        Err(Errno::EPERM) => true,
        Err(_) => false,
    };

    exists && !is_zombie(pid)
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    proc_stat_fields(pid)
        .and_then(|fields| fields.first().map(|state| state == "Z"))
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: u32) -> bool {
    false
}

/// Fields of `/proc/<pid>/stat` after the parenthesised command name.
#[cfg(target_os = "linux")]
fn proc_stat_fields(pid: u32) -> Option<Vec<String>> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    // The command name can contain spaces and parens; split after the last ')'.
    let close_paren = stat.rfind(')')?;
    Some(
        stat.get(close_paren + 2..)?
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    )
}

/// Send `sig` to the process group led by `pid`, falling back to the pid.
///
/// Returns `Ok(false)` when the process no longer exists.
pub(crate) fn send_signal(pid: u32, name: &str, sig: Signal) -> Result<bool> {
    let nix_pid = validate_pid(pid, name)?;
    match killpg(nix_pid, sig).or_else(|_| signal::kill(nix_pid, sig)) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => {
            tracing::warn!("Failed to send {} to PID {} ({}): {}", sig, pid, name, e);
            Ok(false)
        }
    }
}

/// SIGTERM, wait up to `grace_period`, then SIGKILL.
///
/// Returns `true` once the process is gone, `false` if it survived SIGKILL.
pub(crate) async fn terminate(pid: u32, name: &str, grace_period: Duration) -> Result<bool> {
    if !send_signal(pid, name, Signal::SIGTERM)? {
        return Ok(true);
    }

    if wait_for_death(pid, grace_period).await {
        tracing::debug!("Runtime '{}' (PID {}) exited after SIGTERM", name, pid);
        return Ok(true);
    }

    tracing::warn!(
        "Runtime '{}' (PID {}) did not exit after SIGTERM (grace period: {:?}), sending SIGKILL",
        name,
        pid,
        grace_period
    );
    send_signal(pid, name, Signal::SIGKILL)?;
    Ok(wait_for_death(pid, KILL_WAIT).await)
}

async fn wait_for_death(pid: u32, timeout: Duration) -> bool {
    let polls = (timeout.as_millis() / POLL_INTERVAL.as_millis()).max(1);
    for _ in 0..polls {
        if !is_pid_alive(pid) {
            return true;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    !is_pid_alive(pid)
}

/// Check if a PID still belongs to the process started at `expected_start`.
///
/// Returns false only when the process is clearly older or younger than the
/// recorded start (more than 60s apart), i.e. the pid was recycled. When the
/// start time cannot be determined the pid is trusted.
pub(crate) fn pid_matches_start_time(pid: u32, expected_start: DateTime<Utc>) -> bool {
    #[cfg(target_os = "linux")]
    {
        let Some(fields) = proc_stat_fields(pid) else {
            return true;
        };
        // starttime is field 22 of stat, index 19 after the command name.
        let Some(start_jiffies) = fields.get(19).and_then(|s| s.parse::<u64>().ok()) else {
            return true;
        };
        let Some(uptime_secs) = std::fs::read_to_string("/proc/uptime")
            .ok()
            .and_then(|s| s.split_whitespace().next()?.parse::<f64>().ok())
        else {
            return true;
        };

        let ticks = nix::unistd::sysconf(nix::unistd::SysconfVar::CLK_TCK)
            .ok()
            .flatten()
            .map(|v| v as f64)
            .unwrap_or(100.0);

        let process_age = uptime_secs - (start_jiffies as f64 / ticks);
        let expected_age = (Utc::now() - expected_start).num_milliseconds() as f64 / 1000.0;

        if (process_age - expected_age).abs() > 60.0 {
            tracing::warn!(
                "PID {} appears to be reused: process age {:.0}s vs recorded {:.0}s",
                pid,
                process_age,
                expected_age
            );
            return false;
        }
    }

    #[cfg(not(target_os = "linux"))]
    let _ = (pid, expected_start);

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_pid_is_alive() {
        assert!(is_pid_alive(std::process::id()));
        assert!(!is_pid_alive(0));
        assert!(!is_pid_alive(u32::MAX - 1));
    }

    #[test]
    fn own_pid_matches_recent_start() {
        assert!(pid_matches_start_time(std::process::id(), Utc::now()));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn own_pid_does_not_match_old_start() {
        let old = chrono::DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(!pid_matches_start_time(std::process::id(), old));
    }

    #[test]
    fn signalling_missing_pid_reports_gone() {
        assert!(!send_signal(i32::MAX as u32 - 7, "ghost", Signal::SIGTERM).unwrap());
    }

    #[tokio::test]
    async fn terminate_stops_sleeping_child() {
        let dir = tempfile::tempdir().unwrap();
        let mut child = build_command("sleep 30", dir.path(), 9999, None)
            .unwrap()
            .spawn()
            .expect("spawn sleep");
        let pid = child.id().unwrap();

        let reaper = tokio::spawn(async move { child.wait().await });
        assert!(terminate(pid, "sleeper", Duration::from_secs(2)).await.unwrap());
        let status = reaper.await.unwrap().unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn child_sees_port_variable() {
        let dir = tempfile::tempdir().unwrap();
        let output = build_command("echo port=$PORT", dir.path(), 9321, None)
            .unwrap()
            .output()
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "port=9321");
    }

    #[tokio::test]
    async fn output_file_receives_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("out.txt");
        let file = File::create(&out_path).unwrap();

        let status = build_command("sh -c 'echo out; echo err >&2'", dir.path(), 9322, Some(file))
            .unwrap()
            .status()
            .await
            .unwrap();

        assert!(status.success());
        assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "out\nerr\n");
    }
}
