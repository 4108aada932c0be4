use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::{DEFAULT_EVENTBRITE_API_BASE, DEFAULT_TIMEZONE, DEFAULT_USER_AGENT};
use crate::error::{Result, ScraperError};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const EVENTBRITE_TOKEN_ENV: &str = "EVENTBRITE_API_KEY";
pub const APP_ENV: &str = "APP_ENV";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog_path: PathBuf,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub timezone: String,
    /// Prefix every title with the number of tags it was given
    pub debug_titles: bool,
    pub request_timeout_seconds: u64,
    pub user_agent: String,
    pub eventbrite_api_base: String,
    /// Read from the environment only
    #[serde(skip)]
    pub eventbrite_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("event_sources.json"),
            cache_dir: PathBuf::from("cache"),
            output_dir: PathBuf::from("output"),
            log_dir: PathBuf::from("logs"),
            timezone: DEFAULT_TIMEZONE.to_string(),
            debug_titles: false,
            request_timeout_seconds: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            eventbrite_api_base: DEFAULT_EVENTBRITE_API_BASE.to_string(),
            eventbrite_token: None,
        }
    }
}

impl AppConfig {
    /// Load from a TOML file, falling back to defaults when the file is absent,
    /// then layer the environment on top.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                ScraperError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_toml(&content)?
        } else {
            info!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env(
            std::env::var(EVENTBRITE_TOKEN_ENV).ok(),
            std::env::var(APP_ENV).ok(),
        );
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env(&mut self, token: Option<String>, app_env: Option<String>) {
        self.eventbrite_token = token.filter(|t| !t.trim().is_empty());
        if app_env.as_deref() == Some("development") {
            self.debug_titles = true;
        }
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ScraperError::Config(format!("Invalid timezone '{}': {}", self.timezone, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = AppConfig::from_toml("output_dir = \"out\"\nrequest_timeout_seconds = 5\n").unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.request_timeout_seconds, 5);
        assert_eq!(config.catalog_path, PathBuf::from("event_sources.json"));
        assert_eq!(config.timezone().unwrap(), chrono_tz::America::New_York);
    }

    #[test]
    fn test_bad_timezone_is_config_error() {
        let config = AppConfig::from_toml("timezone = \"Mars/Olympus\"").unwrap();
        assert!(matches!(config.timezone(), Err(ScraperError::Config(_))));
    }

    #[test]
    fn test_environment_layer() {
        let mut config = AppConfig::default();
        config.apply_env(Some("secret".into()), Some("development".into()));
        assert_eq!(config.eventbrite_token.as_deref(), Some("secret"));
        assert!(config.debug_titles);

        let mut config = AppConfig::default();
        config.apply_env(Some("  ".into()), Some("production".into()));
        assert!(config.eventbrite_token.is_none());
        assert!(!config.debug_titles);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("cache"));
    }
}
