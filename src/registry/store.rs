use super::{RecoveryPolicy, RegistryEntry};
use crate::error::{Error, Result};
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

type Entries = BTreeMap<String, RegistryEntry>;

/// Durable name -> runtime mapping backed by a pretty-printed JSON file.
///
/// The in-memory map mirrors the file. Every mutation runs under an
/// exclusive advisory lock on `<file>.lock`, re-reads the file, applies the
/// change and rewrites the whole file with write-then-rename, so several
/// `rtl` processes can share one registry.
///
/// # Thread Safety
///
/// The map sits behind a `parking_lot::RwLock`. No lock is ever held across
/// an `.await`; all file I/O here is synchronous and short.
#[derive(Debug)]
pub struct RegistryStore {
    path: PathBuf,
    policy: RecoveryPolicy,
    entries: RwLock<Entries>,
}

impl RegistryStore {
    /// Open the registry at `path`, loading whatever is on disk.
    pub fn open(path: impl Into<PathBuf>, policy: RecoveryPolicy) -> Result<Self> {
        let store = Self {
            path: path.into(),
            policy,
            entries: RwLock::new(Entries::new()),
        };
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory map with the file contents.
    pub fn load(&self) -> Result<()> {
        let entries = read_entries(&self.path, self.policy)?;
        *self.entries.write() = entries;
        Ok(())
    }

    /// Write the in-memory map to disk.
    pub fn save(&self) -> Result<()> {
        let _lock = RegistryLock::acquire(&self.path)?;
        let entries = self.entries.read();
        write_entries(&self.path, &entries)
    }

    pub fn get(&self, name: &str) -> Option<RegistryEntry> {
        self.entries.read().get(name).cloned()
    }

    /// Insert or overwrite `name`, persisting immediately.
    /// Returns the entry that was replaced, if any.
    pub fn set(&self, name: &str, entry: RegistryEntry) -> Result<Option<RegistryEntry>> {
        self.mutate(|entries| {
            let previous = entries.insert(name.to_string(), entry);
            (previous, true)
        })
    }

    /// Remove `name`, persisting only if something was removed.
    pub fn delete(&self, name: &str) -> Result<Option<RegistryEntry>> {
        self.mutate(|entries| {
            let removed = entries.remove(name);
            let changed = removed.is_some();
            (removed, changed)
        })
    }

    /// Remove `name` only if it still records `pid`.
    ///
    /// Exit observers use this so that a child exiting after its name was
    /// relaunched does not drop the new entry.
    pub fn delete_if_pid(&self, name: &str, pid: u32) -> Result<bool> {
        self.mutate(|entries| match entries.get(name) {
            Some(entry) if entry.process_id == pid => {
                entries.remove(name);
                (true, true)
            }
            _ => (false, false),
        })
    }

    /// Copy of every entry, ordered by name.
    pub fn snapshot(&self) -> Vec<(String, RegistryEntry)> {
        self.entries
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect()
    }

    pub fn ports_in_use(&self) -> HashSet<u16> {
        self.entries.read().values().map(|e| e.port).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn mutate<T>(&self, apply: impl FnOnce(&mut Entries) -> (T, bool)) -> Result<T> {
        let _lock = RegistryLock::acquire(&self.path)?;
        let mut entries = self.entries.write();

        // Pick up changes made by other processes since our last read.
        *entries = read_entries(&self.path, self.policy)?;

        let (result, changed) = apply(&mut entries);
        if changed {
            write_entries(&self.path, &entries)?;
        }
        Ok(result)
    }
}

fn read_entries(path: &Path, policy: RecoveryPolicy) -> Result<Entries> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
        Err(e) => return Err(e.into()),
    };

    if contents.trim().is_empty() {
        return Ok(Entries::new());
    }

    match serde_json::from_str(&contents) {
        Ok(entries) => Ok(entries),
        Err(e) => match policy {
            RecoveryPolicy::Empty => {
                tracing::warn!(
                    "Registry file {} is malformed ({}), starting from an empty registry",
                    path.display(),
                    e
                );
                Ok(Entries::new())
            }
            RecoveryPolicy::Fail => Err(Error::RegistryCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        },
    }
}

/// Atomic file write using write-then-rename pattern
fn write_entries(path: &Path, entries: &Entries) -> Result<()> {
    let contents = serde_json::to_string_pretty(entries)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Exclusive advisory lock on the registry's sidecar lock file.
/// Released when dropped.
struct RegistryLock {
    file: fs::File,
}

impl RegistryLock {
    fn acquire(registry_path: &Path) -> Result<Self> {
        if let Some(parent) = registry_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut lock_name = registry_path.as_os_str().to_owned();
        lock_name.push(".lock");

        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(PathBuf::from(lock_name))?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
