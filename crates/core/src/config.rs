//! DeviceWatch Configuration
//!
//! Configuration structures with serde defaults, loaded from YAML.

use crate::error::{DeviceWatchError, DomainError};
use devicewatch_presence::{ExcludedIps, DEFAULT_CACHE_PREFIX};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Constants
// ============================================================================

/// Default counting mode (sum per node)
pub const DEFAULT_DEVICE_LIMIT_MODE: i64 = 0;
/// Config file name outside the home directory
pub const CONFIG_FILE_NAME: &str = "devicewatch.yaml";

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_devicewatch_dir() -> PathBuf {
    home_dir().join(".devicewatch")
}

// ============================================================================
// Main Config
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Presence aggregation settings
    #[serde(default)]
    pub presence: PresenceConfig,
    /// Cache backend settings
    #[serde(default)]
    pub cache: CacheConfig,
}

// ============================================================================
// Presence Config
// ============================================================================

/// Presence aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Prefix in front of the user id in cache keys
    #[serde(default = "PresenceConfig::default_cache_prefix")]
    pub cache_prefix: String,
    /// Counting mode: 0 sums per node, 1 deduplicates globally.
    /// Kept as a raw integer; other values fail when a count is computed.
    #[serde(default = "PresenceConfig::default_device_limit_mode")]
    pub device_limit_mode: i64,
    /// IPs never counted
    #[serde(default)]
    pub excluded_ips: Vec<String>,
}

impl PresenceConfig {
    fn default_cache_prefix() -> String {
        DEFAULT_CACHE_PREFIX.to_string()
    }
    fn default_device_limit_mode() -> i64 {
        DEFAULT_DEVICE_LIMIT_MODE
    }

    pub fn excluded(&self) -> ExcludedIps {
        ExcludedIps::new(self.excluded_ips.iter().cloned())
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            device_limit_mode: DEFAULT_DEVICE_LIMIT_MODE,
            excluded_ips: vec![],
        }
    }
}

// ============================================================================
// Cache Config
// ============================================================================

/// Cache backend settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// JSON file seeding the in-memory cache (full cache key -> stored value)
    #[serde(default)]
    pub snapshot_file: Option<PathBuf>,
}

// ============================================================================
// Config Loading and Validation
// ============================================================================

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file or default locations
    pub fn load(path: Option<&str>) -> Result<Config, DeviceWatchError> {
        let config_path = Self::resolve_config_path(path)?;
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| DeviceWatchError::config_parse_error(format!("Failed to read: {}", e)))?;
        let config: Config = serde_yml::from_str(&content)
            .map_err(|e| DeviceWatchError::config_parse_error(format!("Failed to parse: {}", e)))?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    fn resolve_config_path(path: Option<&str>) -> Result<PathBuf, DeviceWatchError> {
        if let Some(p) = path {
            return Ok(PathBuf::from(p));
        }

        let default_paths = [
            default_devicewatch_dir().join("config.yaml"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(CONFIG_FILE_NAME),
            PathBuf::from(".").join(CONFIG_FILE_NAME),
        ];

        default_paths
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| {
                DeviceWatchError::config_not_found(
                    "Config not found. Run `devicewatch config-sample` or create ~/.devicewatch/config.yaml",
                )
            })
    }
}

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> Result<(), DeviceWatchError> {
        if config.presence.cache_prefix.is_empty() {
            return Err(DeviceWatchError::Domain(DomainError::ConfigInvalid {
                field: "presence.cache_prefix".to_string(),
                reason: "Cache prefix cannot be empty".to_string(),
            }));
        }

        // Identities never contain '_', so such an entry would never match.
        if let Some(bad) = config
            .presence
            .excluded_ips
            .iter()
            .find(|ip| ip.is_empty() || ip.contains('_'))
        {
            return Err(DeviceWatchError::Domain(DomainError::ConfigInvalid {
                field: "presence.excluded_ips".to_string(),
                reason: format!("'{}' is not a device identity", bad),
            }));
        }

        Ok(())
    }
}

impl Config {
    pub fn load(path: &Option<String>) -> Result<Self, DeviceWatchError> {
        ConfigLoader::load(path.as_deref())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), DeviceWatchError> {
        let content = serde_yml::to_string(self).map_err(|e| {
            DeviceWatchError::config_parse_error(format!("Serialization failed: {}", e))
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate a sample configuration
    pub fn sample() -> Self {
        Config {
            presence: PresenceConfig {
                cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
                device_limit_mode: 1,
                excluded_ips: vec![],
            },
            cache: CacheConfig {
                snapshot_file: Some(default_devicewatch_dir().join("snapshots.json")),
            },
        }
    }
}
