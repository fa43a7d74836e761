use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub polling: PollingSettings,
    pub endpoint: EndpointSettings,
    pub storage: StorageSettings,
    pub notifications: NotificationSettings,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_secs: u64,
    pub max_retries: u32,
    pub backoff_factor: u32,
    pub max_delay_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            max_retries: 3,
            backoff_factor: 2,
            max_delay_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub base_url: String,
    pub report_path: String,
    pub task_path: String,
    pub timeout_secs: u64,
    pub token: Option<String>,
    /// Honor HTTP(S)_PROXY from the environment.
    pub system_proxy: bool,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            report_path: "reports/status".to_string(),
            task_path: "tasks/status".to_string(),
            timeout_secs: 30,
            token: None,
            system_proxy: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub state_dir: Option<PathBuf>,
}

impl StorageSettings {
    pub fn resolve_state_dir(&self) -> Option<PathBuf> {
        self.state_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("navigator-poller").join("state")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub desktop: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { desktop: true }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("navigator-poller").join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path().context("Could not determine config directory")?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        settings.validate()?;

        tracing::info!(?path, "Loaded config");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_secs == 0 {
            anyhow::bail!("polling.interval_secs must be greater than 0");
        }
        if self.polling.max_retries == 0 {
            anyhow::bail!("polling.max_retries must be at least 1");
        }
        if self.polling.backoff_factor == 0 {
            anyhow::bail!("polling.backoff_factor must be at least 1");
        }
        if self.polling.max_delay_secs < self.polling.interval_secs {
            anyhow::bail!(
                "polling.max_delay_secs ({}) must not be below polling.interval_secs ({})",
                self.polling.max_delay_secs,
                self.polling.interval_secs
            );
        }
        if !(self.endpoint.base_url.starts_with("http://")
            || self.endpoint.base_url.starts_with("https://"))
        {
            anyhow::bail!(
                "endpoint.base_url must be an http(s) URL, got {}",
                self.endpoint.base_url
            );
        }
        if self.endpoint.timeout_secs == 0 {
            anyhow::bail!("endpoint.timeout_secs must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.polling.interval_secs, 5);
        assert_eq!(settings.polling.max_retries, 3);
        assert_eq!(settings.polling.backoff_factor, 2);
        assert_eq!(settings.polling.max_delay_secs, 60);
        assert_eq!(settings.endpoint.report_path, "reports/status");
        assert!(settings.endpoint.token.is_none());
        assert!(settings.notifications.desktop);
        assert!(!settings.debug);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::default();
        settings.polling.max_retries = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.polling.interval_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.polling.max_delay_secs = 1;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.endpoint.base_url = "ftp://reports".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            debug = true

            [polling]
            interval_secs = 10
            max_retries = 5

            [endpoint]
            base_url = "https://navigator.example.com/api"
            token = "secret"

            [storage]
            state_dir = "/tmp/navigator-state"

            [notifications]
            desktop = false
        "#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.polling.interval_secs, 10);
        assert_eq!(settings.polling.max_retries, 5);
        assert_eq!(settings.polling.backoff_factor, 2);
        assert_eq!(settings.endpoint.base_url, "https://navigator.example.com/api");
        assert_eq!(settings.endpoint.token.as_deref(), Some("secret"));
        assert_eq!(settings.endpoint.task_path, "tasks/status");
        assert_eq!(
            settings.storage.resolve_state_dir(),
            Some(PathBuf::from("/tmp/navigator-state"))
        );
        assert!(!settings.notifications.desktop);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings.polling.max_retries, 3);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[polling]\nmax_retries = 0\n").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }
}
