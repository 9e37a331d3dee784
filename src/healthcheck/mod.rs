//! Liveness and HTTP probes for tracked runtimes.

mod checker;
mod http;

pub use checker::{HealthChecker, PidChecker};
pub use http::HttpChecker;

use crate::error::Result;
use crate::registry::RegistryEntry;
use futures::future::join_all;
use serde::Serialize;
use std::time::Duration;

/// Result of probing one runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub name: String,
    pub pid: u32,
    pub port: u16,
    pub pid_alive: bool,
    pub http_ok: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.pid_alive && self.http_ok
    }
}

/// Probe one runtime: pid liveness plus `GET http://127.0.0.1:<port><path>`.
///
/// The HTTP probe is skipped when the pid is already gone.
pub async fn probe(
    name: &str,
    entry: &RegistryEntry,
    path: &str,
    timeout: Duration,
) -> Result<HealthReport> {
    let pid_alive = PidChecker::new(entry.process_id).check().await?;
    let http_ok = if pid_alive {
        HttpChecker::for_port(entry.port, path, timeout)?
            .check()
            .await?
    } else {
        false
    };

    Ok(HealthReport {
        name: name.to_string(),
        pid: entry.process_id,
        port: entry.port,
        pid_alive,
        http_ok,
    })
}

/// Probe every runtime concurrently, preserving input order.
pub async fn probe_all(
    entries: &[(String, RegistryEntry)],
    path: &str,
    timeout: Duration,
) -> Result<Vec<HealthReport>> {
    join_all(
        entries
            .iter()
            .map(|(name, entry)| probe(name, entry, path, timeout)),
    )
    .await
    .into_iter()
    .collect()
}
