use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "SENTIMENT_API_URL";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the sentiment service.
    pub api_url: String,
    /// Where analyzed CSV files are saved. Defaults to the OS download directory.
    pub download_dir: Option<PathBuf>,
    /// Where the TUI writes its log files.
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            download_dir: None,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the user config file, falling back to defaults when it is absent.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Apply overrides in precedence order: environment, then command line.
    pub fn with_overrides(
        mut self,
        env_api_url: Option<String>,
        cli_api_url: Option<String>,
        cli_download_dir: Option<PathBuf>,
    ) -> Self {
        if let Some(url) = cli_api_url.or(env_api_url).filter(|u| !u.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(dir) = cli_download_dir {
            self.download_dir = Some(dir);
        }
        self
    }

    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn resolved_log_dir(&self) -> Result<PathBuf> {
        match &self.log_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::get_config_dir()?.join("logs")),
        }
    }

    fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("sentiment-chat"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_from(&tmp.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.api_url, "http://localhost:8000");
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.json");
        let config = Config {
            api_url: "http://sentiment.internal:9000".to_string(),
            download_dir: Some(tmp.path().join("out")),
            log_dir: None,
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{ "download_dir": "/tmp/out" }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.resolved_download_dir(), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_override_precedence() {
        let config = Config::new().with_overrides(Some("http://env:1".to_string()), None, None);
        assert_eq!(config.api_url, "http://env:1");

        let config = Config::new().with_overrides(
            Some("http://env:1".to_string()),
            Some("http://cli:2".to_string()),
            Some(PathBuf::from("/data")),
        );
        assert_eq!(config.api_url, "http://cli:2");
        assert_eq!(config.download_dir, Some(PathBuf::from("/data")));

        let config = Config::new().with_overrides(Some(String::new()), None, None);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }
}
