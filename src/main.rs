mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use runtime_launcher::{config, Error as RtlError, Fetcher, Supervisor};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(rtl_error) = e.downcast_ref::<RtlError>() {
            eprintln!("Error: {}", rtl_error);
            if let Some(suggestion) = rtl_error.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let work_dir = match cli.workdir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let settings = config::load(&work_dir, cli.config)?;
    let out = &output::CliOutput;

    match cli.command {
        Commands::Fetch { name, url, git_ref } => {
            let fetcher = Fetcher::new(&settings)?.with_ref(git_ref);
            commands::run_fetch(&fetcher, &name, &url, out).await?;
        }
        Commands::Deploy {
            name,
            url,
            git_ref,
            command,
            detach,
        } => {
            let fetcher = Fetcher::new(&settings)?.with_ref(git_ref);
            let supervisor = Supervisor::from_settings(&settings)?;
            commands::run_deploy(
                &fetcher,
                &supervisor,
                &name,
                &url,
                command.as_deref(),
                detach,
                out,
            )
            .await?;
        }
        Commands::Launch {
            name,
            dir,
            command,
            detach,
        } => {
            let supervisor = Supervisor::from_settings(&settings)?;
            let dir = resolve_dir(&work_dir, dir);
            commands::run_launch(&supervisor, &name, &dir, command.as_deref(), detach, out)
                .await?;
        }
        Commands::Stop { name } => {
            let supervisor = Supervisor::from_settings(&settings)?;
            commands::run_stop(&supervisor, &name, out).await?;
        }
        Commands::List { json } => {
            let supervisor = Supervisor::from_settings(&settings)?;
            commands::run_list(&supervisor, json, out)?;
        }
        Commands::Logs { service, tail } => {
            let supervisor = Supervisor::from_settings(&settings)?;
            commands::run_logs(&supervisor, service.as_deref(), tail, out).await?;
        }
        Commands::Health { path, json } => {
            let supervisor = Supervisor::from_settings(&settings)?;
            commands::run_health(&supervisor, &settings, path.as_deref(), json, out).await?;
        }
        Commands::Prune => {
            let supervisor = Supervisor::from_settings(&settings)?;
            commands::run_prune(&supervisor, out)?;
        }
    }

    Ok(())
}

/// Relative launch directories are taken from the working directory.
fn resolve_dir(work_dir: &Path, dir: PathBuf) -> PathBuf {
    if dir.is_absolute() {
        dir
    } else {
        work_dir.join(dir)
    }
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
