//! # Runtime Launcher
//!
//! Fetches repository snapshots from GitHub and runs them as supervised child
//! processes on the local host.
//!
//! ## Features
//!
//! - **Fetching**: download a repository tarball and unpack it with its
//!   wrapping root folder stripped
//! - **Supervision**: launch a snapshot with a random `PORT`, capture its
//!   output into a shared log and forget it when it exits
//! - **Registry**: a JSON file of running runtimes shared between `rtl`
//!   invocations, with file locking and atomic rewrites
//! - **Health checks**: pid liveness plus an HTTP probe per runtime
//!
//! ## Quick Start
//!
//! ```no_run
//! use runtime_launcher::{Fetcher, Settings, Supervisor};
//!
//! # async fn example() -> Result<(), runtime_launcher::Error> {
//! let settings = Settings::default();
//! let fetcher = Fetcher::new(&settings)?;
//! let supervisor = Supervisor::from_settings(&settings)?;
//!
//! let dir = fetcher.fetch("https://github.com/acme/widget", "widget").await?;
//! let entry = supervisor.launch("widget", &dir).await?;
//! println!("widget is on port {}", entry.port);
//!
//! supervisor.stop("widget").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! - [`Supervisor`] methods take `&self`; share it by reference or `Arc`
//! - registry writes are serialised across processes by an advisory lock
//! - each child has two output tasks and one exit watcher on the tokio runtime

pub mod config;
pub mod error;
pub mod fetch;
pub mod healthcheck;
pub mod port;
pub mod registry;
pub mod supervisor;

// Re-export commonly used types
pub use config::{Parser, Settings};
pub use error::{Error, Result};
pub use fetch::Fetcher;
pub use port::{PortAllocator, PortRange};
pub use registry::{RecoveryPolicy, RegistryEntry, RegistryStore, RuntimeSummary};
pub use supervisor::{
    ExitOutcome, OutputMode, RelaunchPolicy, SharedLog, StopMode, Supervisor, SupervisorOptions,
};
