//! Session configuration, loadable from TOML

use std::fs::{read_to_string, write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::encoding::DEFAULT_ENCODING;
use crate::error::{Error, Result};
use crate::json::JsonConvention;

/// User agent sent when `mock_browser` is on
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_6) AppleWebKit/603.3.8 (KHTML, like Gecko) Version/10.1.2 Safari/603.3.8";

/// Worker permits per available CPU for the async session
const WORKERS_PER_CPU: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Value of the `User-Agent` header
    pub user_agent: String,
    /// Whether to send `user_agent` at all
    pub mock_browser: bool,
    /// Encoding for responses that declare none
    pub default_encoding: String,
    /// Concurrent fetches for the async session; `None` picks a size from
    /// the available parallelism
    pub workers: Option<usize>,
    /// Convention used by [`Response::json`](crate::Response::json)
    pub json_convention: JsonConvention,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            mock_browser: true,
            default_encoding: DEFAULT_ENCODING.to_string(),
            workers: None,
            json_convention: JsonConvention::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file. A missing file gives the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Attempting to read session config from: {:?}", path);
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(Self::default());
        }
        Self::from_toml_str(&read_to_string(path)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        tracing::debug!("Attempting to write session config to: {:?}", path.as_ref());
        let toml_string =
            toml::to_string(self).map_err(|e| Error::ConfigurationError(e.to_string()))?;
        write(path, toml_string)?;
        Ok(())
    }

    /// Pool size for the async session
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                * WORKERS_PER_CPU
        })
    }

    fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(Error::ConfigurationError(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.default_encoding.trim().is_empty() {
            return Err(Error::ConfigurationError(
                "default_encoding must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        assert_eq!(SessionConfig::from_toml_str("").unwrap(), SessionConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = SessionConfig::from_toml_str(
            "mock_browser = false\nworkers = 3\njson_convention = \"parker\"\n",
        )
        .unwrap();
        assert!(!config.mock_browser);
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.json_convention, JsonConvention::Parker);
        assert_eq!(config.default_encoding, DEFAULT_ENCODING);
    }

    #[test]
    fn rejects_bad_values() {
        for content in ["workers = 0", "json_convention = \"jsonml\"", "default_encoding = \" \""] {
            assert!(
                matches!(SessionConfig::from_toml_str(content), Err(Error::ConfigurationError(_))),
                "{content:?} should be rejected"
            );
        }
    }

    #[test]
    fn default_pool_scales_with_cpus() {
        let workers = SessionConfig::default().worker_count();
        assert!(workers >= WORKERS_PER_CPU);
        assert_eq!(workers % WORKERS_PER_CPU, 0);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        assert_eq!(SessionConfig::load(&path).unwrap(), SessionConfig::default());

        let config = SessionConfig {
            workers: Some(2),
            json_convention: JsonConvention::Yahoo,
            ..SessionConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(SessionConfig::load(&path).unwrap(), config);
    }
}
