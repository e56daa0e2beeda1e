//! DeviceWatch Error Types
//!
//! This module defines a layered error hierarchy:
//! - `DomainError`: Business logic errors (config, presence lookups)
//! - `InfraError`: Infrastructure errors (IO, serialization, cache backend)
//! - `DeviceWatchError`: Top-level error that wraps both categories

use devicewatch_presence::{PresenceError, DEVICE_LIMIT_MODE_KEY};
use std::fmt;

/// Domain-level errors representing business logic failures
#[derive(Debug)]
pub enum DomainError {
    /// Configuration file not found at the specified path
    ConfigNotFound { path: String },
    /// Configuration validation failed
    ConfigInvalid { field: String, reason: String },
    /// Configuration parsing failed
    ConfigParse { source: String },
    /// Presence lookup failed
    Presence { operation: String, reason: String },
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigNotFound { path } => write!(f, "Config not found: {}", path),
            Self::ConfigInvalid { field, reason } => {
                write!(f, "Config invalid [{}]: {}", field, reason)
            }
            Self::ConfigParse { source } => write!(f, "Config parse error: {}", source),
            Self::Presence { operation, reason } => {
                write!(f, "Presence {} failed: {}", operation, reason)
            }
        }
    }
}

impl std::error::Error for DomainError {}

/// Infrastructure-level errors representing external system failures
#[derive(Debug)]
pub enum InfraError {
    /// IO operation failed
    Io(std::io::Error),
    /// JSON serialization/deserialization failed
    Json(serde_json::Error),
    /// YAML serialization/deserialization failed
    Yaml(serde_yml::Error),
    /// Cache backend request failed
    Cache { operation: String, reason: String },
}

impl fmt::Display for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Json(err) => write!(f, "JSON error: {}", err),
            Self::Yaml(err) => write!(f, "YAML error: {}", err),
            Self::Cache { operation, reason } => {
                write!(f, "Cache error [{}]: {}", operation, reason)
            }
        }
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Yaml(e) => Some(e),
            Self::Cache { .. } => None,
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<serde_yml::Error> for InfraError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Yaml(err)
    }
}

/// Top-level error type for DeviceWatch
#[derive(Debug)]
pub enum DeviceWatchError {
    /// Business logic error
    Domain(DomainError),
    /// Infrastructure/external system error
    Infra(InfraError),
    /// Generic error for edge cases
    Other(String),
}

impl fmt::Display for DeviceWatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(e) => write!(f, "{}", e),
            Self::Infra(e) => write!(f, "{}", e),
            Self::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DeviceWatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Domain(e) => Some(e),
            Self::Infra(e) => Some(e),
            Self::Other(_) => None,
        }
    }
}

impl From<DomainError> for DeviceWatchError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<InfraError> for DeviceWatchError {
    fn from(err: InfraError) -> Self {
        Self::Infra(err)
    }
}

impl From<std::io::Error> for DeviceWatchError {
    fn from(err: std::io::Error) -> Self {
        Self::Infra(InfraError::Io(err))
    }
}

impl From<serde_json::Error> for DeviceWatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Infra(InfraError::Json(err))
    }
}

impl From<serde_yml::Error> for DeviceWatchError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Infra(InfraError::Yaml(err))
    }
}

impl From<PresenceError> for DeviceWatchError {
    fn from(err: PresenceError) -> Self {
        match err {
            PresenceError::InvalidDeviceLimitMode(mode) => {
                Self::Domain(DomainError::ConfigInvalid {
                    field: DEVICE_LIMIT_MODE_KEY.to_string(),
                    reason: format!("unsupported value {} (expected 0 or 1)", mode),
                })
            }
            PresenceError::Cache { operation, reason } => {
                Self::Infra(InfraError::Cache { operation, reason })
            }
            PresenceError::Settings(reason) => Self::Domain(DomainError::Presence {
                operation: "settings lookup".to_string(),
                reason,
            }),
            PresenceError::Io(source) => Self::from(source),
            PresenceError::Json(source) => Self::from(source),
        }
    }
}

impl DeviceWatchError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigNotFound { path: path.into() })
    }

    pub fn config_parse_error(source: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigParse {
            source: source.into(),
        })
    }

    pub fn is_config_not_found(&self) -> bool {
        matches!(self, Self::Domain(DomainError::ConfigNotFound { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_mode_becomes_config_error() {
        let err = DeviceWatchError::from(PresenceError::InvalidDeviceLimitMode(4));
        match err {
            DeviceWatchError::Domain(DomainError::ConfigInvalid { field, reason }) => {
                assert_eq!(field, "device_limit_mode");
                assert!(reason.contains('4'));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn cache_failure_is_infrastructure() {
        let err = DeviceWatchError::from(PresenceError::cache("get_many", "timeout"));
        assert!(matches!(err, DeviceWatchError::Infra(InfraError::Cache { .. })));
        assert_eq!(err.to_string(), "Cache error [get_many]: timeout");
    }
}
