//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides (prefixed with `KEYMINT_`)
//! - Multiple configuration file locations
//! - Default values for all settings
//!
//! Process-level configuration lives here (paths, signing secret, static
//! policy, schedules). Operator-tunable settings that admins may change at
//! runtime (registration toggle, max key days, quota knobs) live in the
//! [`RuntimeSettings`](crate::models::RuntimeSettings) document instead and
//! are accessed through the settings service.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Record store location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding the JSON collection files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory for backup snapshots (defaults to `<data_dir>/backups`)
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Get the effective backup directory
    pub fn effective_backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("backups"))
    }
}

/// Key signing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SigningConfig {
    /// Process-wide HMAC secret used to sign key codes
    #[serde(default = "default_hmac_secret")]
    pub hmac_secret: String,
}

/// Static policy knobs (not changeable at runtime)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    /// Maximum accounts that may register from one fingerprinted device
    #[serde(default = "default_max_accounts_per_device")]
    pub max_accounts_per_device: usize,
}

/// Background maintenance configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MaintenanceConfig {
    /// Interval between expired-key sweeps, in minutes
    #[serde(default = "default_sweep_interval_mins")]
    pub sweep_interval_mins: u64,
}

/// Backup snapshot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupConfig {
    #[serde(default = "default_backup_enabled")]
    pub enabled: bool,
    /// Interval between automatic snapshots, in hours
    #[serde(default = "default_backup_interval_hours")]
    pub interval_hours: u64,
    /// Snapshots older than this many days are pruned
    #[serde(default = "default_backup_retention_days")]
    pub retention_days: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_hmac_secret() -> String {
    "please-change-hmac-secret".to_string()
}

fn default_max_accounts_per_device() -> usize {
    3
}

fn default_sweep_interval_mins() -> u64 {
    60
}

fn default_backup_enabled() -> bool {
    true
}

fn default_backup_interval_hours() -> u64 {
    6
}

fn default_backup_retention_days() -> u64 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backup_dir: None,
        }
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            hmac_secret: default_hmac_secret(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_accounts_per_device: default_max_accounts_per_device(),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_mins: default_sweep_interval_mins(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: default_backup_enabled(),
            interval_hours: default_backup_interval_hours(),
            retention_days: default_backup_retention_days(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            signing: SigningConfig::default(),
            policy: PolicyConfig::default(),
            maintenance: MaintenanceConfig::default(),
            backup: BackupConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables (prefixed with KEYMINT_)
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        // Check for config path override from environment
        let config_path = std::env::var("KEYMINT_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = if let Some(ref path) = config_path {
            if path.exists() {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                serde_norway::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?
            } else {
                AppConfig::default()
            }
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            PathBuf::from("/etc/keymint/config.yaml"),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = std::env::var("KEYMINT_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(backup_dir) = std::env::var("KEYMINT_BACKUP_DIR") {
            self.storage.backup_dir = Some(PathBuf::from(backup_dir));
        }
        if let Ok(secret) = std::env::var("KEYMINT_HMAC_SECRET") {
            self.signing.hmac_secret = secret;
        }
        if let Ok(level) = std::env::var("KEYMINT_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.signing.hmac_secret.is_empty() {
            anyhow::bail!("signing.hmac_secret must not be empty");
        }
        if self.signing.hmac_secret == default_hmac_secret() {
            eprintln!("[CONFIG] WARNING: signing.hmac_secret is still the default value");
        }
        if self.policy.max_accounts_per_device == 0 {
            anyhow::bail!("policy.max_accounts_per_device must be at least 1");
        }
        if self.maintenance.sweep_interval_mins == 0 {
            anyhow::bail!("maintenance.sweep_interval_mins must be at least 1");
        }
        if self.backup.enabled && self.backup.interval_hours == 0 {
            anyhow::bail!("backup.interval_hours must be at least 1");
        }
        Ok(())
    }
}
