use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Persisted record for one running runtime.
///
/// The name is the key of the registry map and is not repeated here. Field
/// names on disk are `pid`, `port` and `started` (milliseconds since epoch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(rename = "pid")]
    pub process_id: u32,
    pub port: u16,
    #[serde(rename = "started")]
    pub started_at: i64,
}

impl RegistryEntry {
    /// Entry stamped with the current time.
    pub fn new(process_id: u32, port: u16) -> Self {
        Self {
            process_id,
            port,
            started_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn started_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.started_at).single()
    }

    /// A runtime counts as alive whenever a pid is recorded.
    ///
    /// This is not a liveness probe; see `Supervisor::prune` for that.
    pub fn has_pid(&self) -> bool {
        self.process_id != 0
    }
}

/// One row of `Supervisor::list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeSummary {
    pub name: String,
    pub pid: u32,
    pub port: u16,
    pub alive: bool,
}

impl RuntimeSummary {
    pub fn from_entry(name: &str, entry: &RegistryEntry) -> Self {
        Self {
            name: name.to_string(),
            pid: entry.process_id,
            port: entry.port,
            alive: entry.has_pid(),
        }
    }
}

/// What to do when the registry file exists but cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPolicy {
    /// Log a warning and continue with an empty registry.
    #[default]
    Empty,
    /// Refuse to start.
    Fail,
}
