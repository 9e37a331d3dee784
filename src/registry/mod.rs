//! Durable registry of running runtimes.
//!
//! The registry maps a service name to the pid, port and start time of its
//! child process. It lives in a single JSON file that is rewritten in full on
//! every change:
//!
//! ```json
//! {
//!   "widget": { "pid": 4242, "port": 9123, "started": 1760000000000 }
//! }
//! ```
//!
//! # Example
//!
//! ```no_run
//! use runtime_launcher::registry::{RecoveryPolicy, RegistryEntry, RegistryStore};
//!
//! # fn example() -> runtime_launcher::Result<()> {
//! let store = RegistryStore::open("registry.json", RecoveryPolicy::Empty)?;
//! store.set("widget", RegistryEntry::new(4242, 9123))?;
//! assert!(store.get("widget").is_some());
//! # Ok(())
//! # }
//! ```

mod store;
mod types;

pub use store::RegistryStore;
pub use types::{RecoveryPolicy, RegistryEntry, RuntimeSummary};
