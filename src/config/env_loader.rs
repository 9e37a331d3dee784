//! Environment loading for the launcher.
//!
//! `.env` files are read with dotenvy before settings are resolved, then a
//! small set of `RTL_*` variables override whatever the settings file says.

use super::Settings;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Name of the variable holding the GitHub access token.
pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";

const PROJECTS_DIR_VAR: &str = "RTL_PROJECTS_DIR";
const REGISTRY_FILE_VAR: &str = "RTL_REGISTRY_FILE";
const LOG_FILE_VAR: &str = "RTL_LOG_FILE";
const API_BASE_VAR: &str = "RTL_API_BASE";

/// Load `<dir>/.env` into the process environment if it exists.
///
/// Variables already present in the environment are not overwritten.
/// Returns the path that was loaded, if any.
pub fn load_dotenv(dir: &Path) -> Result<Option<PathBuf>> {
    let path = dir.join(".env");
    match dotenvy::from_path(&path) {
        Ok(()) => {
            tracing::debug!("Loaded environment from {}", path.display());
            Ok(Some(path))
        }
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(Error::Config(format!(
            "Failed to parse environment file {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Apply `RTL_*` overrides and the GitHub token from the process environment.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Apply overrides using an arbitrary lookup. Empty values are ignored.
pub fn apply_overrides_from<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(dir) = get(PROJECTS_DIR_VAR) {
        settings.projects_dir = PathBuf::from(dir);
    }
    if let Some(file) = get(REGISTRY_FILE_VAR) {
        settings.registry_file = PathBuf::from(file);
    }
    if let Some(file) = get(LOG_FILE_VAR) {
        settings.log_file = PathBuf::from(file);
    }
    if let Some(base) = get(API_BASE_VAR) {
        settings.github.api_base = base;
    }
    if let Some(token) = get(GITHUB_TOKEN_VAR) {
        settings.github.token = Some(token);
    }
}
