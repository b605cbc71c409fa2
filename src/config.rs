use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::history::DASHBOARD_CAP;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/analyze";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const API_BASE_ENV: &str = "FAKEJOB_API_BASE";
pub const ORIGIN_ENV: &str = "FAKEJOB_ORIGIN";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub api_base: Option<String>,
    pub timeout_secs: Option<u64>,
    pub history_cap: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiBaseSource {
    Flag,
    Environment,
    ConfigFile,
    Origin,
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_base: String,
    pub api_base_source: ApiBaseSource,
    pub timeout: Duration,
    pub history_cap: usize,
}

impl Config {
    pub fn load(flag: Option<&str>) -> Result<Self> {
        let file = match Self::config_path() {
            Some(path) if path.exists() => Some(Self::read_file(&path)?),
            _ => None,
        };
        let env_base = std::env::var(API_BASE_ENV).ok();
        let origin = std::env::var(ORIGIN_ENV).ok();

        let config = Self::resolve(flag, env_base.as_deref(), file.as_ref(), origin.as_deref());
        debug!("Resolved API base {} from {:?}", config.api_base, config.api_base_source);
        Ok(config)
    }

    /// Precedence: flag, environment, config file, served origin, loopback default.
    pub fn resolve(
        flag: Option<&str>,
        env_base: Option<&str>,
        file: Option<&FileConfig>,
        origin: Option<&str>,
    ) -> Self {
        let non_empty = |s: &&str| !s.trim().is_empty();

        let (api_base, api_base_source) = if let Some(base) = flag.filter(non_empty) {
            (base.to_string(), ApiBaseSource::Flag)
        } else if let Some(base) = env_base.filter(non_empty) {
            (base.to_string(), ApiBaseSource::Environment)
        } else if let Some(base) = file.and_then(|f| f.api_base.as_deref()).filter(non_empty) {
            (base.to_string(), ApiBaseSource::ConfigFile)
        } else if let Some(origin) = origin.filter(non_empty) {
            (
                format!("{}/analyze", origin.trim().trim_end_matches('/')),
                ApiBaseSource::Origin,
            )
        } else {
            (DEFAULT_API_BASE.to_string(), ApiBaseSource::Default)
        };

        let timeout_secs = file
            .and_then(|f| f.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let history_cap = file
            .and_then(|f| f.history_cap)
            .filter(|cap| *cap > 0)
            .unwrap_or(DASHBOARD_CAP);

        Self {
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_base_source,
            timeout: Duration::from_secs(timeout_secs),
            history_cap,
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "fakejob")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn read_file(path: &Path) -> Result<FileConfig> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Write a commented default config unless one already exists.
    pub fn write_default(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let defaults = FileConfig {
            api_base: Some(DEFAULT_API_BASE.to_string()),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            history_cap: Some(DASHBOARD_CAP),
        };
        let body = toml::to_string_pretty(&defaults).context("Failed to serialize config")?;
        std::fs::write(path, format!("# fakejob client configuration\n{}", body))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_api_base() {
        let config = Config::resolve(None, None, None, None);
        assert_eq!(config.api_base, "http://127.0.0.1:8000/analyze");
        assert_eq!(config.api_base_source, ApiBaseSource::Default);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.history_cap, 50);
    }

    #[test]
    fn test_precedence_flag_env_file() {
        let file = FileConfig {
            api_base: Some("http://file:9000/analyze".to_string()),
            ..Default::default()
        };

        let config = Config::resolve(Some("http://flag/analyze/"), Some("http://env/analyze"), Some(&file), None);
        assert_eq!(config.api_base, "http://flag/analyze");
        assert_eq!(config.api_base_source, ApiBaseSource::Flag);

        let config = Config::resolve(None, Some("http://env/analyze"), Some(&file), None);
        assert_eq!(config.api_base_source, ApiBaseSource::Environment);

        let config = Config::resolve(None, Some("  "), Some(&file), None);
        assert_eq!(config.api_base, "http://file:9000/analyze");
        assert_eq!(config.api_base_source, ApiBaseSource::ConfigFile);
    }

    #[test]
    fn test_origin_gets_analyze_path() {
        let config = Config::resolve(None, None, None, Some("https://fakejob.example/"));
        assert_eq!(config.api_base, "https://fakejob.example/analyze");
        assert_eq!(config.api_base_source, ApiBaseSource::Origin);
    }

    #[test]
    fn test_file_overrides_timeout_and_cap() {
        let file: FileConfig = toml::from_str("timeout_secs = 5\nhistory_cap = 20\n").unwrap();
        let config = Config::resolve(None, None, Some(&file), None);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.history_cap, 20);
        assert_eq!(config.api_base_source, ApiBaseSource::Default);
    }

    #[test]
    fn test_zero_cap_ignored() {
        let file = FileConfig {
            history_cap: Some(0),
            ..Default::default()
        };
        assert_eq!(Config::resolve(None, None, Some(&file), None).history_cap, 50);
    }
}
