//! Launcher configuration.
//!
//! - `settings` - the [`Settings`] structure and its defaults
//! - `parser` - locating and parsing `runtime-launcher.yaml`
//! - `duration` - human-readable duration strings
//! - `env_loader` - `.env` loading and `RTL_*` overrides

pub mod env_loader;

mod duration;
mod parser;
mod settings;

pub use duration::*;
pub use parser::*;
pub use settings::*;

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Build the effective settings for a working directory.
///
/// Order: defaults, then the settings file (explicit path or the one found in
/// `work_dir`), then `.env` + `RTL_*` overrides. Relative paths are finally
/// resolved against `work_dir`.
pub fn load(work_dir: &Path, explicit: Option<PathBuf>) -> Result<Settings> {
    env_loader::load_dotenv(work_dir)?;

    let parser = Parser::new();
    let mut settings = match explicit.or_else(|| Parser::find_settings_in_dir(work_dir)) {
        Some(path) => {
            tracing::debug!("Loading settings from {}", path.display());
            parser.load_settings(&path)?
        }
        None => Settings::default(),
    };

    env_loader::apply_env_overrides(&mut settings);
    settings.resolve_paths(work_dir);
    Ok(settings)
}
