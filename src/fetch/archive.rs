use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use tar::Archive;

/// Unpack a `.tar.gz` into `dest`, dropping the first path component of
/// every entry.
///
/// Hosting platforms wrap snapshots in a single `<owner>-<repo>-<sha>/`
/// folder; after stripping, the repository files land directly in `dest`.
/// Entries that would resolve outside `dest` fail the whole extraction.
///
/// Returns the number of entries written.
pub(crate) fn extract_stripped(archive_path: &Path, dest: &Path) -> Result<usize> {
    let root = fs::canonicalize(dest)?;
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let mut written = 0;

    let entries = archive
        .entries()
        .map_err(|e| Error::Archive(format!("cannot read {}: {}", archive_path.display(), e)))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| Error::Archive(e.to_string()))?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_pax_global_extensions() || entry_type.is_pax_local_extensions() {
            continue;
        }

        let path = entry
            .path()
            .map_err(|e| Error::Archive(format!("unreadable entry path: {}", e)))?
            .into_owned();

        let Some(relative) = strip_first_component(&path)? else {
            // The wrapping root folder itself.
            continue;
        };

        if entry_type.is_hard_link() {
            tracing::warn!("Skipping hard link '{}' in {}", path.display(), archive_path.display());
            continue;
        }

        // Symlinks extracted earlier may redirect this entry; resolve the
        // parent on disk rather than trusting the textual path.
        let target = dest.join(&relative);
        let parent = match target.parent() {
            Some(parent) => create_parent_inside(&root, parent, &path)?,
            None => root.clone(),
        };

        if entry_type.is_symlink() {
            if let Some(link) = entry.link_name().ok().flatten() {
                if !resolves_inside(&root, &parent, &link) {
                    return Err(Error::Archive(format!(
                        "link '{}' points outside the archive: {}",
                        path.display(),
                        link.display()
                    )));
                }
            }
        }

        // A later entry replaces an earlier symlink rather than writing through it.
        let is_symlink = fs::symlink_metadata(&target)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);
        if is_symlink {
            fs::remove_file(&target)?;
        }

        entry
            .unpack(&target)
            .map_err(|e| Error::Archive(format!("failed to unpack '{}': {}", path.display(), e)))?;
        written += 1;
    }

    tracing::debug!(
        "Extracted {} entries from {} into {}",
        written,
        archive_path.display(),
        dest.display()
    );
    Ok(written)
}

/// `a/b/c` -> `b/c`. `None` for the root folder entry itself.
fn strip_first_component(path: &Path) -> Result<Option<PathBuf>> {
    let mut stripped = PathBuf::new();
    for (i, component) in path.components().enumerate() {
        match component {
            Component::Normal(part) => {
                if i > 0 {
                    stripped.push(part);
                }
            }
            Component::CurDir if i == 0 => {}
            _ => {
                return Err(Error::Archive(format!(
                    "entry '{}' escapes the destination directory",
                    path.display()
                )))
            }
        }
    }
    Ok((!stripped.as_os_str().is_empty()).then_some(stripped))
}

/// Create `parent` and return its canonical form, failing if it resolves
/// outside `root`.
fn create_parent_inside(root: &Path, parent: &Path, entry: &Path) -> Result<PathBuf> {
    let escapes = || {
        Error::Archive(format!(
            "entry '{}' escapes the destination directory",
            entry.display()
        ))
    };

    // Check the deepest existing ancestor first so nothing is created outside.
    let existing = parent
        .ancestors()
        .find(|p| p.exists())
        .ok_or_else(escapes)?;
    if !fs::canonicalize(existing)?.starts_with(root) {
        return Err(escapes());
    }

    fs::create_dir_all(parent)?;
    let resolved = fs::canonicalize(parent)?;
    if !resolved.starts_with(root) {
        return Err(escapes());
    }
    Ok(resolved)
}

/// Whether a symlink in the canonical directory `parent` pointing at `target`
/// stays under `root`.
///
/// Only the link itself is normalised; anything it points through must
/// already have passed this check when it was extracted.
fn resolves_inside(root: &Path, parent: &Path, target: &Path) -> bool {
    let mut resolved = parent.to_path_buf();
    for component in target.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return false;
                }
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    resolved.starts_with(root)
}
