// DeviceWatch Presence
//
// Aggregates per-node presence records from the shared cache into per-user
// device counts and listings.

pub mod calculator;
pub mod error;
pub mod service;
pub mod snapshot;
pub mod store;

pub use calculator::{count_devices, count_distinct_tokens, CountingMode, ExcludedIps};
pub use error::PresenceError;
pub use service::{
    DeviceDetail, DeviceLimitUser, PresenceUser, UserDevices, UserId, UserOnlineService,
};
pub use snapshot::{device_identity, is_blank, NodeRecord, PresenceSnapshot};
pub use store::{
    cache_key, MemoryPresenceCache, PresenceCache, SettingsStore, StaticSettings,
    DEFAULT_CACHE_PREFIX, DEVICE_LIMIT_MODE_KEY,
};
