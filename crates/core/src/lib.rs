pub mod config;
pub mod error;
pub mod service;

// Re-export commonly used types
pub use config::{CacheConfig, Config, ConfigLoader, ConfigValidator, PresenceConfig};
pub use error::{DeviceWatchError, DomainError, InfraError};
pub use service::build_service;
