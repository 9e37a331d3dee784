use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rtl")]
#[command(about = "Runtime Launcher - Fetch GitHub snapshots and run them as supervised processes")]
pub struct Cli {
    /// Settings file path (defaults to runtime-launcher.yaml in the working directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Working directory
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch a repository snapshot and launch it
    Deploy {
        /// Runtime name (also the directory under the projects dir)
        name: String,

        /// GitHub repository URL, e.g. https://github.com/acme/widget
        url: String,

        /// Branch, tag or commit to fetch (defaults to the default branch)
        #[arg(long = "ref", value_name = "REF")]
        git_ref: Option<String>,

        /// Command to run instead of the configured launch command
        #[arg(long)]
        command: Option<String>,

        /// Return right after launching instead of supervising in the foreground
        #[arg(short, long)]
        detach: bool,
    },
    /// Fetch a repository snapshot without launching it
    Fetch {
        name: String,

        url: String,

        #[arg(long = "ref", value_name = "REF")]
        git_ref: Option<String>,
    },
    /// Launch an existing directory
    Launch {
        name: String,

        /// Directory to run in
        dir: PathBuf,

        #[arg(long)]
        command: Option<String>,

        #[arg(short, long)]
        detach: bool,
    },
    /// Stop a runtime
    Stop {
        name: String,
    },
    /// List active runtimes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the shared log
    Logs {
        /// Only show lines for this runtime
        service: Option<String>,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        tail: usize,
    },
    /// Probe every runtime's pid and HTTP endpoint
    Health {
        /// HTTP path to probe (defaults to the configured path)
        #[arg(long)]
        path: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove entries whose process is gone
    Prune,
}
