use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::{LogConfig, LogFormat, LogLevel, LOG_FILE_NAME};
use crate::models::TrendWindow;
use crate::trend::PLATEAU_THRESHOLD_WEEKS;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// General application settings
    pub settings: AppSettings,

    /// Weigh-in tracking preferences
    pub tracking: TrackingSettings,

    /// Logging preferences
    pub logging: LogSettings,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Directory holding the tracker documents
    pub data_dir: PathBuf,
}

/// Weigh-in tracking preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Only accept weigh-ins on Sundays
    pub enforce_sunday: bool,

    /// Number of weigh-ins inspected by the plateau check shown on the dashboard
    pub plateau_threshold_weeks: usize,

    /// Trend window applied to newly initialized trackers
    pub default_trend_window: TrendWindow,
}

/// Logging preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /// Base level before `-v` flags are applied
    pub level: LogLevel,

    /// Console output format
    pub format: LogFormat,

    /// Also write a JSON log file into the data directory
    pub log_to_file: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();
        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            settings: AppSettings::default(),
            tracking: TrackingSettings::default(),
            logging: LogSettings::default(),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            data_dir: AppConfig::default_root().join("data"),
        }
    }
}

impl Default for TrackingSettings {
    fn default() -> Self {
        TrackingSettings {
            enforce_sunday: true,
            plateau_threshold_weeks: PLATEAU_THRESHOLD_WEEKS,
            default_trend_window: TrendWindow::default(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            log_to_file: false,
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// `~/.leanrs`
    fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".leanrs")
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        Self::default_root().join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Self::default();
        }

        match Self::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Config file unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// Logging setup derived from these preferences
    pub fn log_config(&self, verbose: u8) -> LogConfig {
        LogConfig {
            level: self.logging.level,
            format: self.logging.format,
            file_path: self
                .logging
                .log_to_file
                .then(|| self.settings.data_dir.join("logs").join(LOG_FILE_NAME)),
            ..LogConfig::default()
        }
        .with_verbosity(verbose)
    }

    /// Every settable key with its current value, in display order
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        CONFIG_KEYS
            .iter()
            .filter_map(|key| self.get_value(key).map(|value| (*key, value)))
            .collect()
    }

    /// Read a value by dotted key, e.g. `tracking.enforce_sunday`
    pub fn get_value(&self, key: &str) -> Option<String> {
        let value = match key {
            "settings.data_dir" => self.settings.data_dir.display().to_string(),
            "tracking.enforce_sunday" => self.tracking.enforce_sunday.to_string(),
            "tracking.plateau_threshold_weeks" => self.tracking.plateau_threshold_weeks.to_string(),
            "tracking.default_trend_window" => self.tracking.default_trend_window.weeks().to_string(),
            "logging.level" => self.logging.level.to_filter().to_string(),
            "logging.format" => format!("{:?}", self.logging.format).to_lowercase(),
            "logging.log_to_file" => self.logging.log_to_file.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// Set a value by dotted key, parsing it to the field's type
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "settings.data_dir" => self.settings.data_dir = PathBuf::from(value),
            "tracking.enforce_sunday" => self.tracking.enforce_sunday = parse_bool(value)?,
            "tracking.plateau_threshold_weeks" => {
                let weeks: usize = value
                    .parse()
                    .with_context(|| format!("Invalid number of weeks: {}", value))?;
                if weeks == 0 {
                    anyhow::bail!("Plateau threshold must be at least one week");
                }
                self.tracking.plateau_threshold_weeks = weeks;
            }
            "tracking.default_trend_window" => {
                self.tracking.default_trend_window =
                    value.parse().map_err(|e: String| anyhow::anyhow!(e))?
            }
            "logging.level" => {
                self.logging.level = value.parse().map_err(|e: String| anyhow::anyhow!(e))?
            }
            "logging.format" => {
                self.logging.format = value.parse().map_err(|e: String| anyhow::anyhow!(e))?
            }
            "logging.log_to_file" => self.logging.log_to_file = parse_bool(value)?,
            _ => anyhow::bail!("Unknown configuration key: {}", key),
        }

        self.metadata.updated_at = Utc::now();
        Ok(())
    }
}

/// Keys accepted by [`AppConfig::get_value`] and [`AppConfig::set_value`]
pub const CONFIG_KEYS: [&str; 7] = [
    "settings.data_dir",
    "tracking.enforce_sunday",
    "tracking.plateau_threshold_weeks",
    "tracking.default_trend_window",
    "logging.level",
    "logging.format",
    "logging.log_to_file",
];

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => anyhow::bail!("Invalid boolean: {}", value),
    }
}
