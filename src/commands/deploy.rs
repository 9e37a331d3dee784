use crate::output::UserOutput;
use runtime_launcher::{Fetcher, OutputMode, Supervisor};
use std::path::{Path, PathBuf};

pub async fn run_fetch(
    fetcher: &Fetcher,
    name: &str,
    url: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<PathBuf> {
    out.progress(&format!("Fetching {} from {}...", name, url));
    match fetcher.fetch(url, name).await {
        Ok(dir) => {
            out.finish_progress(" done");
            out.success(&format!("{} unpacked into {}", name, dir.display()));
            Ok(dir)
        }
        Err(e) => {
            out.finish_progress(" failed");
            Err(e.into())
        }
    }
}

pub async fn run_launch(
    supervisor: &Supervisor,
    name: &str,
    dir: &Path,
    command: Option<&str>,
    detach: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let output = if detach {
        OutputMode::File
    } else {
        OutputMode::Captured
    };
    let entry = supervisor.launch_with(name, dir, command, output).await?;
    out.success(&format!(
        "Launched {} — PID {} (port {})",
        name, entry.process_id, entry.port
    ));

    if detach {
        out.status(&format!(
            "Running detached. Stop it with: rtl stop {}",
            name
        ));
        return Ok(());
    }

    supervise_foreground(supervisor, name, out).await
}

pub async fn run_deploy(
    fetcher: &Fetcher,
    supervisor: &Supervisor,
    name: &str,
    url: &str,
    command: Option<&str>,
    detach: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let dir = run_fetch(fetcher, name, url, out).await?;
    run_launch(supervisor, name, &dir, command, detach, out).await
}

/// Block until the runtime exits on its own or Ctrl-C stops it.
async fn supervise_foreground(
    supervisor: &Supervisor,
    name: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    out.status("Supervising in the foreground (Press Ctrl+C to stop)");

    tokio::select! {
        outcome = supervisor.wait_for_exit(name) => {
            match outcome {
                Some(outcome) if outcome.code() == Some(0) => {
                    out.status(&format!("{}: {}", name, outcome.message()));
                }
                Some(outcome) => {
                    out.warning(&format!("{}: {}", name, outcome.message()));
                }
                None => {
                    out.warning(&format!("{} is not supervised by this process", name));
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            out.progress(&format!("Stopping {}...", name));
            match supervisor.shutdown().await {
                Ok(()) => out.finish_progress(" done"),
                Err(e) => {
                    out.finish_progress(" failed");
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
