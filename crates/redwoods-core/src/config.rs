//! Application configuration management.
//!
//! Holds the identity provider address and key, the site origin used for
//! email redirect links, channel settings and the last used email.
//!
//! Configuration is stored at `~/.config/redwoods-mailer/config.json`.
//! Environment variables override the file for the current run only.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::RedirectUrls;
use crate::channel::ChannelConfig;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "redwoods-mailer";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Origin used for redirect links when none is configured
const DEFAULT_SITE_ORIGIN: &str = "http://localhost:5173";

pub const ENV_PROVIDER_URL: &str = "REDWOODS_PROVIDER_URL";
pub const ENV_ANON_KEY: &str = "REDWOODS_ANON_KEY";
pub const ENV_SITE_ORIGIN: &str = "REDWOODS_SITE_ORIGIN";
pub const ENV_CHANNEL_URL: &str = "REDWOODS_CHANNEL_URL";
pub const ENV_EMAIL: &str = "REDWOODS_EMAIL";

fn default_reconnect_attempts() -> u32 {
    3
}

fn default_reconnect_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub provider_url: Option<String>,
    pub anon_key: Option<String>,
    pub site_origin: Option<String>,
    pub channel_url: Option<String>,
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider_url: None,
            anon_key: None,
            site_origin: None,
            channel_url: None,
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply overrides from a variable lookup, usually `std::env::var`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_PROVIDER_URL) {
            self.provider_url = Some(url);
        }
        if let Some(key) = get(ENV_ANON_KEY) {
            self.anon_key = Some(key);
        }
        if let Some(origin) = get(ENV_SITE_ORIGIN) {
            self.site_origin = Some(origin);
        }
        if let Some(url) = get(ENV_CHANNEL_URL) {
            self.channel_url = Some(url);
        }
        if let Some(email) = get(ENV_EMAIL) {
            self.last_email = Some(email);
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn provider_url(&self) -> Result<&str> {
        self.provider_url
            .as_deref()
            .with_context(|| format!("No identity provider configured (set {ENV_PROVIDER_URL})"))
    }

    pub fn anon_key(&self) -> &str {
        self.anon_key.as_deref().unwrap_or_default()
    }

    pub fn site_origin(&self) -> &str {
        self.site_origin
            .as_deref()
            .unwrap_or(DEFAULT_SITE_ORIGIN)
            .trim_end_matches('/')
    }

    pub fn redirect_urls(&self) -> RedirectUrls {
        RedirectUrls::for_origin(self.site_origin())
    }

    pub fn channel_config(&self) -> ChannelConfig {
        let mut channel = ChannelConfig {
            reconnect_attempts: self.reconnect_attempts,
            reconnect_interval: Duration::from_millis(self.reconnect_interval_ms),
            ..ChannelConfig::default()
        };
        if let Some(url) = &self.channel_url {
            channel.url = url.clone();
        }
        channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.provider_url.is_none());
        assert_eq!(config.reconnect_attempts, 3);
        assert_eq!(config.reconnect_interval_ms, 1000);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            provider_url: Some("https://id.example.com".to_string()),
            last_email: Some("ada@example.com".to_string()),
            reconnect_attempts: 5,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider_url.as_deref(), Some("https://id.example.com"));
        assert_eq!(loaded.last_email.as_deref(), Some("ada@example.com"));
        assert_eq!(loaded.reconnect_attempts, 5);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"anon_key": "anon"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.anon_key(), "anon");
        assert_eq!(config.reconnect_interval_ms, 1000);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_overrides_skip_blank_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_PROVIDER_URL, "https://id.example.com"),
            (ENV_SITE_ORIGIN, "https://mail.example.com/"),
            (ENV_CHANNEL_URL, "  "),
        ]);
        let mut config = Config {
            channel_url: Some("ws://chat.example.com".to_string()),
            ..Config::default()
        };
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.provider_url().unwrap(), "https://id.example.com");
        assert_eq!(config.site_origin(), "https://mail.example.com");
        assert_eq!(config.channel_url.as_deref(), Some("ws://chat.example.com"));
    }

    #[test]
    fn test_missing_provider_url_names_variable() {
        let err = Config::default().provider_url().unwrap_err();
        assert!(err.to_string().contains(ENV_PROVIDER_URL));
    }

    #[test]
    fn test_redirects_follow_site_origin() {
        let config = Config {
            site_origin: Some("https://mail.example.com".to_string()),
            ..Config::default()
        };
        let redirects = config.redirect_urls();
        assert_eq!(redirects.email_verified, "https://mail.example.com/auth?verified=true");
        assert_eq!(redirects.password_reset, "https://mail.example.com/reset-password");
    }

    #[test]
    fn test_channel_config_uses_settings() {
        let config = Config {
            channel_url: Some("ws://chat.example.com".to_string()),
            reconnect_attempts: 1,
            reconnect_interval_ms: 250,
            ..Config::default()
        };
        let channel = config.channel_config();
        assert_eq!(channel.url, "ws://chat.example.com");
        assert_eq!(channel.reconnect_attempts, 1);
        assert_eq!(channel.reconnect_interval, Duration::from_millis(250));
        assert!(channel.auto_connect);

        assert_eq!(Config::default().channel_config().url, "ws://localhost:8080");
    }
}
