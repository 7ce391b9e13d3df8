//! specgate library - Validate specs and change proposals
//!
//! This library exposes the pieces of the specgate CLI that are worth
//! testing on their own: project discovery, config loading and output
//! rendering. Validation itself lives in `specgate-core`.

pub mod config;
pub mod output;

use config::Config;
use eyre::{Result, WrapErr};
use specgate_core::project::{CHANGES_DIR, SPECS_DIR};
use std::path::{Path, PathBuf};

/// Nearest ancestor of `start` (inclusive) that contains a `specs/` or
/// `changes/` directory. Falls back to `start` itself.
pub fn find_project_root(start: &Path) -> PathBuf {
    let mut current = start.to_path_buf();

    loop {
        if current.join(SPECS_DIR).is_dir() || current.join(CHANGES_DIR).is_dir() {
            return current;
        }

        if !current.pop() {
            return start.to_path_buf();
        }
    }
}

/// Load and parse the config file at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        eyre::bail!(
            "Config file not found at {}\n\n\
             Create a config file with your settings:\n\n\
             mode: strict\n\
             parallel: true\n\
             format: text",
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = serde_yaml::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Load config if it exists, otherwise return the defaults.
///
/// A config file that exists but does not parse is still an error.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use specgate_core::ValidationMode;

    #[test]
    fn test_find_project_root_walks_up() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("specs")).unwrap();
        let nested = temp.path().join("docs/deep");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), temp.path());
    }

    #[test]
    fn test_find_project_root_falls_back_to_start() {
        let temp = tempfile::tempdir().unwrap();
        // Either the start itself or a project somewhere above it
        let root = find_project_root(temp.path());
        assert!(temp.path().starts_with(&root));
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = load_config_or_default(&temp.path().join("config.yaml")).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.parallel);
    }

    #[test]
    fn test_partial_config() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "mode: lenient\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.mode, ValidationMode::Lenient);
        assert!(config.parallel);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "mode: sloppy\n").unwrap();

        let err = load_config_or_default(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }
}
