//! Configuration module for the relay.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! The CLI only chooses which file is read (`--config`).
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `NVRELAY_` and use double
//! underscores to separate nested levels:
//! - `NVRELAY_POLLING__TICK_MS=250` sets `polling.tick_ms`
//! - `NVRELAY_DELIVERY__TIMEOUT_MS=800` sets `delivery.timeout_ms`
//! - `NVRELAY_SOURCES__MASIN2__FALLBACK=192.168.1.2:10010` sets a source's fallback

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::delivery::Endpoint;

/// Default settings file name, looked up in the working directory and its ancestors.
pub const CONFIG_FILE_NAME: &str = "nvrelay.toml";

/// Environment variable naming an explicit settings file.
pub const CONFIG_PATH_ENV: &str = "NVRELAY_CONFIG";

const ENV_PREFIX: &str = "NVRELAY_";

/// Errors from loading or validating settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("No sources configured")]
    NoSources,

    #[error("Source '{source_id}' has an invalid {role} address '{address}': {reason}")]
    InvalidEndpoint {
        source_id: String,
        role: &'static str,
        address: String,
        reason: String,
    },

    #[error("Invalid setting {key}: {reason}")]
    InvalidTuning { key: &'static str, reason: String },

    #[error("Cannot write settings to {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Watched sources, visited in file order
    #[serde(default)]
    pub sources: IndexMap<String, SourceConfig>,

    /// Directory polling and file stability settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Network delivery settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// OS change notifications
    #[serde(default)]
    pub file_watch: FileWatchConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SourceConfig {
    /// Directory the device writes its XML files into
    pub path: PathBuf,

    /// Primary NVR address (`host:port`)
    pub primary: String,

    /// Address tried once when the primary fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,

    /// File suffix to pick up, matched case-insensitively
    #[serde(default = "default_extension")]
    pub extension: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PollingConfig {
    /// Delay between directory scans of one source
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// A file must be at least this old before a sample counts as stable
    #[serde(default = "default_min_file_age_ms")]
    pub min_file_age_ms: u64,

    /// Delay between stability samples
    #[serde(default = "default_stability_interval_ms")]
    pub stability_interval_ms: u64,

    /// Consecutive unchanged samples required (at least 2)
    #[serde(default = "default_stability_required_checks")]
    pub stability_required_checks: u32,

    /// Upper bound on waiting for a file to settle
    #[serde(default = "default_stability_timeout_ms")]
    pub stability_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeliveryConfig {
    /// Connect and send timeout for each attempt
    #[serde(default = "default_delivery_timeout_ms")]
    pub timeout_ms: u64,

    /// Pause after each delivery attempt
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,

    /// Pause between a failed primary attempt and the fallback attempt
    #[serde(default = "default_fallback_delay_ms")]
    pub fallback_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FileWatchConfig {
    /// Wake a source early when its directory changes
    #[serde(default = "default_false")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for every module
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `nvrelay::delivery = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_extension() -> String {
    "xml".to_string()
}
fn default_false() -> bool {
    false
}
fn default_tick_ms() -> u64 {
    500
}
fn default_min_file_age_ms() -> u64 {
    800
}
fn default_stability_interval_ms() -> u64 {
    250
}
fn default_stability_required_checks() -> u32 {
    2
}
fn default_stability_timeout_ms() -> u64 {
    15_000
}
fn default_delivery_timeout_ms() -> u64 {
    500
}
fn default_send_delay_ms() -> u64 {
    500
}
fn default_fallback_delay_ms() -> u64 {
    500
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            sources: IndexMap::new(),
            polling: PollingConfig::default(),
            delivery: DeliveryConfig::default(),
            file_watch: FileWatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            min_file_age_ms: default_min_file_age_ms(),
            stability_interval_ms: default_stability_interval_ms(),
            stability_required_checks: default_stability_required_checks(),
            stability_timeout_ms: default_stability_timeout_ms(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_delivery_timeout_ms(),
            send_delay_ms: default_send_delay_ms(),
            fallback_delay_ms: default_fallback_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl PollingConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }
}

impl SourceConfig {
    pub fn new(path: impl Into<PathBuf>, primary: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            primary: primary.into(),
            fallback: None,
            extension: default_extension(),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// Parse the primary and fallback addresses.
    pub fn endpoints(&self, source_id: &str) -> Result<(Endpoint, Option<Endpoint>), ConfigError> {
        let parse = |role: &'static str, address: &str| {
            address
                .parse::<Endpoint>()
                .map_err(|e| ConfigError::InvalidEndpoint {
                    source_id: source_id.to_string(),
                    role,
                    address: address.to_string(),
                    reason: e.to_string(),
                })
        };

        let primary = parse("primary", &self.primary)?;
        let fallback = self
            .fallback
            .as_deref()
            .map(|address| parse("fallback", address))
            .transpose()?;

        Ok((primary, fallback))
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// The settings file is `$NVRELAY_CONFIG` when set, otherwise the nearest
    /// `nvrelay.toml` in the working directory or its ancestors.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .or_else(Self::find_config_file)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, layering environment overrides on top.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Find `nvrelay.toml` searching from the current directory up to root.
    fn find_config_file() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Reject settings the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        for (id, source) in &self.sources {
            source.endpoints(id)?;
        }

        let polling = &self.polling;
        if polling.stability_required_checks < 2 {
            return Err(ConfigError::InvalidTuning {
                key: "polling.stability_required_checks",
                reason: format!("must be at least 2, got {}", polling.stability_required_checks),
            });
        }

        let positive = [
            ("polling.tick_ms", polling.tick_ms),
            ("polling.stability_interval_ms", polling.stability_interval_ms),
            ("polling.stability_timeout_ms", polling.stability_timeout_ms),
            ("delivery.timeout_ms", self.delivery.timeout_ms),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidTuning {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let write_err = |reason: String| ConfigError::Write {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, toml_string).map_err(|e| write_err(e.to_string()))
    }

    /// Write a commented sample configuration.
    pub fn init_config_file(path: impl AsRef<Path>, force: bool) -> Result<PathBuf, ConfigError> {
        let path = path.as_ref();

        if !force && path.exists() {
            return Err(ConfigError::Write {
                path: path.to_path_buf(),
                reason: "file already exists, use --force to overwrite".to_string(),
            });
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        std::fs::write(path, SAMPLE_CONFIG).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(path.to_path_buf())
    }
}

const SAMPLE_CONFIG: &str = r#"# nvrelay settings
#
# Every [sources.<id>] table is one deposit machine: the folder its XML
# files land in and the NVR address that receives the text overlay.
# Sources are polled in the order they appear here.

version = 1

[sources.masin1]
path = 'D:\PronoteFTP-UploadFolder\Pronote1\PN123321\PN123321'
primary = "192.168.1.2:10010"

[sources.masin2]
path = 'D:\PronoteFTP-UploadFolder\Pronote1\PN123321\PN123322'
primary = "192.168.1.2:10011"
# Tried once, after delivery.fallback_delay_ms, when the primary fails
fallback = "192.168.1.2:10010"

[polling]
tick_ms = 500
# Files younger than this never count as stable (coarse mtime granularity)
min_file_age_ms = 800
stability_interval_ms = 250
stability_required_checks = 2
# After this the file is parsed anyway
stability_timeout_ms = 15000

[delivery]
timeout_ms = 500
send_delay_ms = 500
fallback_delay_ms = 500

[file_watch]
# Use OS notifications to wake a source between ticks
enabled = false

[logging]
default = "info"

[logging.modules]
# "nvrelay::delivery" = "debug"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample_settings() -> Settings {
        let mut settings = Settings::default();
        settings.sources.insert(
            "masin1".to_string(),
            SourceConfig::new("/data/pn1", "192.168.1.2:10010"),
        );
        settings
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert!(settings.sources.is_empty());
        assert_eq!(settings.polling.tick_ms, 500);
        assert_eq!(settings.polling.min_file_age_ms, 800);
        assert_eq!(settings.polling.stability_interval_ms, 250);
        assert_eq!(settings.polling.stability_required_checks, 2);
        assert_eq!(settings.polling.stability_timeout_ms, 15_000);
        assert_eq!(settings.delivery.timeout_ms, 500);
        assert!(!settings.file_watch.enabled);
        assert_eq!(settings.logging.default, "info");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nvrelay.toml");

        let toml_content = r#"
[sources.zeta]
path = "/data/zeta"
primary = "10.0.0.9:9000"

[sources.alpha]
path = "/data/alpha"
primary = "10.0.0.1:9000"
fallback = "10.0.0.1:9001"
extension = "XML"

[polling]
tick_ms = 100
stability_required_checks = 3

[delivery]
send_delay_ms = 0
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        let ids: Vec<&str> = settings.sources.keys().map(String::as_str).collect();
        // File order is preserved
        assert_eq!(ids, vec!["zeta", "alpha"]);

        let alpha = &settings.sources["alpha"];
        assert_eq!(alpha.fallback.as_deref(), Some("10.0.0.1:9001"));
        assert_eq!(alpha.extension, "XML");
        assert_eq!(settings.sources["zeta"].extension, "xml");

        assert_eq!(settings.polling.tick_ms, 100);
        assert_eq!(settings.polling.stability_required_checks, 3);
        // Untouched values keep their defaults
        assert_eq!(settings.polling.min_file_age_ms, 800);
        assert_eq!(settings.delivery.send_delay_ms, 0);
        assert_eq!(settings.delivery.timeout_ms, 500);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested/nvrelay.toml");

        let mut settings = sample_settings();
        settings.polling.tick_ms = 42;
        settings.delivery.fallback_delay_ms = 7;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.polling.tick_ms, 42);
        assert_eq!(loaded.delivery.fallback_delay_ms, 7);
        assert_eq!(loaded.sources, settings.sources);
    }

    #[test]
    fn test_sample_config_is_valid() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nvrelay.toml");

        Settings::init_config_file(&config_path, false).unwrap();
        let settings = Settings::load_from(&config_path).unwrap();

        assert_eq!(settings.sources.len(), 2);
        assert_eq!(
            settings.sources["masin2"].fallback.as_deref(),
            Some("192.168.1.2:10010")
        );
        assert!(settings.validate().is_ok());

        // Refuses to overwrite without force
        assert!(Settings::init_config_file(&config_path, false).is_err());
        assert!(Settings::init_config_file(&config_path, true).is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nvrelay.toml");
        fs::write(&config_path, "[logging]\ndefault = \"warn\"\n").unwrap();

        unsafe {
            std::env::set_var("NVRELAY_LOGGING__DEFAULT", "trace");
        }

        let settings = Settings::load_from(&config_path).unwrap();

        unsafe {
            std::env::remove_var("NVRELAY_LOGGING__DEFAULT");
        }

        // Environment variable should override config file
        assert_eq!(settings.logging.default, "trace");
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(matches!(
            Settings::default().validate(),
            Err(ConfigError::NoSources)
        ));

        let mut settings = sample_settings();
        settings.sources["masin1"].fallback = Some("not-an-address".to_string());
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidEndpoint { role: "fallback", .. })
        ));

        let mut settings = sample_settings();
        settings.polling.stability_required_checks = 1;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidTuning { .. })
        ));

        let mut settings = sample_settings();
        settings.delivery.timeout_ms = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidTuning {
                key: "delivery.timeout_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_source_endpoints() {
        let source = SourceConfig::new("/d", "10.0.0.1:9000").with_fallback("10.0.0.1:9001");
        let (primary, fallback) = source.endpoints("s").unwrap();
        assert_eq!(primary.port(), 9000);
        assert_eq!(fallback.unwrap().port(), 9001);
    }
}
