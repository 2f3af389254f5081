//! CLI configuration handling.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sessionforge_core::FileStore;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory holding cached session credentials.
    pub cache_dir: PathBuf,

    /// Logging level used when `RUST_LOG` is not set.
    pub log_level: String,

    pub exchange: ExchangeConfig,
}

/// How temporary credentials are obtained.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Helper program followed by its arguments.
    pub command: Vec<String>,

    /// Upper bound on one exchange, in seconds. `0` disables the limit.
    pub timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            cache_dir: FileStore::default_dir(),
            log_level: default_log_level(),
            exchange: ExchangeConfig::default(),
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 30,
        }
    }
}

impl ExchangeConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Load configuration from `path`, or from the default location.
///
/// A missing file at the default location yields the defaults. A missing
/// file given explicitly is an error.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let (config_path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (default_config_path(), false),
    };

    let mut config = if explicit || config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else {
        CliConfig::default()
    };

    config.config_path = config_path;
    Ok(config)
}

fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("sessionforge.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "raibid-labs", "sessionforge")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
                cache_dir = "/run/user/1000/sessionforge"
                log_level = "debug"

                [exchange]
                command = ["aws-sts-helper", "--profile", "base"]
                timeout_secs = 10
            "#,
        );

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.config_path, path);
        assert_eq!(config.cache_dir, PathBuf::from("/run/user/1000/sessionforge"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.exchange.command, vec!["aws-sts-helper", "--profile", "base"]);
        assert_eq!(config.exchange.timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[exchange]\ncommand = [\"helper\"]\n");

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.cache_dir, FileStore::default_dir());
        assert_eq!(config.exchange.timeout_secs, 30);
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        let exchange = ExchangeConfig {
            command: Vec::new(),
            timeout_secs: 0,
        };
        assert_eq!(exchange.timeout(), None);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("absent.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "log_level = [");

        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config"));
    }
}
