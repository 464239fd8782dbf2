//! Configuration file support for medstock.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/medstock/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub alerts: AlertConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Low-stock alert configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_alerts_enabled")]
    pub enabled: bool,

    /// Used for medicines without their own threshold
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: f64,

    #[serde(default = "default_check_interval_minutes")]
    pub check_interval_minutes: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: default_alerts_enabled(),
            low_stock_threshold: default_low_stock_threshold(),
            check_interval_minutes: default_check_interval_minutes(),
        }
    }
}

impl AlertConfig {
    pub fn check_interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.check_interval_minutes))
    }
}

/// Time zone used to evaluate schedules and render dates
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayZone {
    #[default]
    Local,
    Utc,
}

/// Display configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    #[serde(default)]
    pub timezone: DisplayZone,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("medstock")
}

fn default_alerts_enabled() -> bool {
    true
}

fn default_low_stock_threshold() -> f64 {
    10.0
}

fn default_check_interval_minutes() -> u32 {
    60
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the alert check cannot work with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.alerts.low_stock_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(Error::Config(format!(
                "alerts.low_stock_threshold must be >= 0, got {}",
                threshold
            )));
        }
        if self.alerts.check_interval_minutes == 0 {
            return Err(Error::Config(
                "alerts.check_interval_minutes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("medstock").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.alerts.enabled);
        assert_eq!(config.alerts.low_stock_threshold, 10.0);
        assert_eq!(config.alerts.check_interval_minutes, 60);
        assert_eq!(config.display.timezone, DisplayZone::Local);
        assert!(config.data.data_dir.ends_with("medstock"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(
            config.alerts.low_stock_threshold,
            parsed.alerts.low_stock_threshold
        );
        assert_eq!(config.data.data_dir, parsed.data.data_dir);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[alerts]
low_stock_threshold = 5.0

[display]
timezone = "utc"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.alerts.low_stock_threshold, 5.0);
        assert_eq!(config.alerts.check_interval_minutes, 60); // default
        assert_eq!(config.display.timezone, DisplayZone::Utc);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[alerts]\ncheck_interval_minutes = 0\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_and_load_from_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.alerts.enabled = false;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(!loaded.alerts.enabled);
    }
}
