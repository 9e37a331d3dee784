use super::Settings;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory when `--config` is not given.
pub const SETTINGS_FILE_NAME: &str = "runtime-launcher.yaml";

pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    /// Find the settings file in `dir`, trying the `.yml` spelling as well.
    ///
    /// Unlike a project config, the settings file is optional, so a miss is
    /// `Ok(None)` rather than an error.
    pub fn find_settings_in_dir(dir: &Path) -> Option<PathBuf> {
        let path = dir.join(SETTINGS_FILE_NAME);
        if path.exists() {
            return Some(path);
        }

        let alt_path = path.with_extension("yml");
        if alt_path.exists() {
            return Some(alt_path);
        }

        None
    }

    /// Load settings from a file path.
    pub fn load_settings<P: AsRef<Path>>(&self, path: P) -> Result<Settings> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read settings file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        self.parse_settings(&content)
    }

    pub fn parse_settings(&self, content: &str) -> Result<Settings> {
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_file_is_default() {
        let settings = Parser::new().parse_settings("\n  \n").unwrap();
        assert_eq!(settings.launch_command, "node index.js");
    }

    #[test]
    fn finds_yml_spelling() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Parser::find_settings_in_dir(dir.path()).is_none());

        fs::write(dir.path().join("runtime-launcher.yml"), "launch_command: ./run").unwrap();
        let found = Parser::find_settings_in_dir(dir.path()).unwrap();
        let settings = Parser::new().load_settings(found).unwrap();
        assert_eq!(settings.launch_command, "./run");
    }

    #[test]
    fn invalid_yaml_is_reported() {
        let err = Parser::new().parse_settings("port_range: [").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }
}
