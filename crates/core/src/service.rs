//! Service wiring
//!
//! Builds a ready [`UserOnlineService`] from a [`Config`].

use crate::config::Config;
use crate::error::DeviceWatchError;
use devicewatch_presence::{MemoryPresenceCache, StaticSettings, UserOnlineService};
use std::sync::Arc;
use tracing::{info, warn};

pub fn build_service(config: &Config) -> Result<UserOnlineService, DeviceWatchError> {
    let cache = match &config.cache.snapshot_file {
        Some(path) if path.exists() => {
            info!("Loading presence snapshots from {:?}", path);
            MemoryPresenceCache::from_json_file(path)?
        }
        Some(path) => {
            warn!("Snapshot file {:?} not found, starting with an empty cache", path);
            MemoryPresenceCache::new()
        }
        None => MemoryPresenceCache::new(),
    };

    let settings = StaticSettings::new(Some(config.presence.device_limit_mode));

    Ok(
        UserOnlineService::new(Arc::new(cache), Arc::new(settings))
            .with_prefix(config.presence.cache_prefix.clone())
            .with_excluded_ips(config.presence.excluded()),
    )
}
