//! Client configuration: where the identity service lives and where local
//! state is kept.
//!
//! Loaded from `~/.sesame/config.toml` when present (override the path with
//! `SESAME_CONFIG`), then environment variables `SESAME_BASE_URL` and
//! `SESAME_DATA_DIR` are applied on top.

use crate::storage::FileStorage;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the identity service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Directory for persisted session state. Defaults to `~/.sesame`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Default config file path, `~/.sesame/config.toml`.
    pub fn default_path() -> PathBuf {
        FileStorage::default_dir().join("config.toml")
    }

    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("SESAME_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(base_url) = std::env::var("SESAME_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(dir) = std::env::var("SESAME_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }

    /// Resolved data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(FileStorage::default_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var("SESAME_CONFIG");
        std::env::remove_var("SESAME_BASE_URL");
        std::env::remove_var("SESAME_DATA_DIR");
    }

    #[test]
    fn test_parse_config_file() {
        let config: Config =
            toml::from_str("base_url = \"https://id.example.com\"\ndata_dir = \"/tmp/s\"")
                .unwrap();
        assert_eq!(config.base_url, "https://id.example.com");
        assert_eq!(config.data_dir.as_deref(), Some(std::path::Path::new("/tmp/s")));
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.base_url, default_base_url());
        assert!(config.data_dir.is_none());
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = \"https://file.example.com\"").unwrap();

        std::env::set_var("SESAME_CONFIG", &path);
        std::env::set_var("SESAME_BASE_URL", "https://env.example.com");
        let config = Config::load().unwrap();
        assert_eq!(config.base_url, "https://env.example.com");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_file_yields_defaults() {
        clear_env();
        std::env::set_var("SESAME_CONFIG", "/nonexistent/sesame.toml");
        let config = Config::load().unwrap();
        assert_eq!(config.base_url, default_base_url());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_unparsable_file_is_an_error() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = [not toml").unwrap();

        std::env::set_var("SESAME_CONFIG", &path);
        assert!(Config::load().is_err());
        clear_env();
    }
}
