//! User online service
//!
//! Entry points over the presence cache. The alive list, the device listing
//! and the standalone calculation go through the mode-aware calculator; the
//! single and batch online counts use the distinct-token policy instead.

use crate::calculator::{count_devices, count_distinct_tokens, CountingMode, ExcludedIps};
use crate::error::PresenceError;
use crate::snapshot::{device_identity, is_blank, PresenceSnapshot};
use crate::store::{
    cache_key, PresenceCache, SettingsStore, DEFAULT_CACHE_PREFIX, DEVICE_LIMIT_MODE_KEY,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

pub type UserId = i64;

/// Anything that carries a user id.
pub trait PresenceUser {
    fn user_id(&self) -> UserId;
}

impl PresenceUser for UserId {
    fn user_id(&self) -> UserId {
        *self
    }
}

/// Minimal user record for alive-list lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimitUser {
    pub id: UserId,
}

impl PresenceUser for DeviceLimitUser {
    fn user_id(&self) -> UserId {
        self.id
    }
}

/// One row of a user's device listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDetail {
    pub ip: String,
    pub last_seen: Option<Value>,
    pub node_type: String,
}

/// Device listing plus the mode-aware total.
///
/// `total_count` may exceed `devices.len()` under
/// [`CountingMode::SumPerNode`], since the listing is keyed by identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDevices {
    pub total_count: usize,
    pub devices: Vec<DeviceDetail>,
}

pub struct UserOnlineService {
    cache: Arc<dyn PresenceCache>,
    settings: Arc<dyn SettingsStore>,
    prefix: String,
    excluded: ExcludedIps,
}

impl UserOnlineService {
    pub fn new(cache: Arc<dyn PresenceCache>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            cache,
            settings,
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            excluded: ExcludedIps::default(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_excluded_ips(mut self, excluded: ExcludedIps) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn excluded_ips(&self) -> &ExcludedIps {
        &self.excluded
    }

    /// Resolve the counting mode; unset means [`CountingMode::SumPerNode`].
    pub async fn counting_mode(&self) -> Result<CountingMode, PresenceError> {
        let raw = self.settings.device_limit_mode().await?.unwrap_or(0);
        CountingMode::try_from(raw).map_err(|err| {
            warn!(setting = DEVICE_LIMIT_MODE_KEY, value = raw, "invalid counting mode");
            err
        })
    }

    /// Mode-aware device count for an already fetched raw snapshot.
    pub async fn calculate_device_count(&self, raw: &Value) -> Result<usize, PresenceError> {
        let mode = self.counting_mode().await?;
        Ok(count_devices(&PresenceSnapshot::from(raw), mode, &self.excluded))
    }

    /// Non-zero mode-aware counts for the given users.
    pub async fn get_alive_list<U: PresenceUser>(
        &self,
        users: &[U],
    ) -> Result<BTreeMap<UserId, usize>, PresenceError> {
        if users.is_empty() {
            return Ok(BTreeMap::new());
        }

        let ids: Vec<UserId> = users.iter().map(PresenceUser::user_id).collect();
        let snapshots = self.fetch_snapshots(&ids).await?;
        if snapshots.values().all(Option::is_none) {
            return Ok(BTreeMap::new());
        }

        let mode = self.counting_mode().await?;
        let alive: BTreeMap<UserId, usize> = snapshots
            .iter()
            .filter_map(|(id, snapshot)| snapshot.as_ref().map(|snapshot| (*id, snapshot)))
            .map(|(id, snapshot)| (id, count_devices(snapshot, mode, &self.excluded)))
            .filter(|(_, count)| *count > 0)
            .collect();

        debug!(requested = ids.len(), alive = alive.len(), %mode, "alive list computed");
        Ok(alive)
    }

    /// Deduplicated device listing for one user.
    ///
    /// An identity seen on several nodes keeps its first position and takes
    /// the data of the last node that reports it.
    ///
    /// Only a blank raw cache value short-circuits to an empty listing. A value
    /// that is present but normalizes to no nodes still resolves the counting
    /// mode, so an invalid mode fails there too.
    pub async fn get_user_devices(&self, user_id: UserId) -> Result<UserDevices, PresenceError> {
        let Some(snapshot) = self.fetch_snapshot(user_id).await? else {
            return Ok(UserDevices::default());
        };

        let mut devices: Vec<DeviceDetail> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for (node_key, record) in snapshot.nodes() {
            let node_type = record.node_type(node_key);
            for token in &record.alive_ips {
                if self.excluded.excludes_token(token) {
                    continue;
                }
                let ip = device_identity(token);
                let detail = DeviceDetail {
                    ip: ip.to_string(),
                    last_seen: record.last_update_at.clone(),
                    node_type: node_type.clone(),
                };
                match positions.get(ip).copied() {
                    Some(idx) => devices[idx] = detail,
                    None => {
                        positions.insert(ip.to_string(), devices.len());
                        devices.push(detail);
                    }
                }
            }
        }

        let mode = self.counting_mode().await?;
        let total_count = count_devices(&snapshot, mode, &self.excluded);
        debug!(user_id, total_count, listed = devices.len(), "user devices listed");

        Ok(UserDevices {
            total_count,
            devices,
        })
    }

    /// Distinct-token counts for every requested user, zeros included.
    pub async fn get_online_counts(
        &self,
        user_ids: &[UserId],
    ) -> Result<BTreeMap<UserId, usize>, PresenceError> {
        if user_ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let snapshots = self.fetch_snapshots(user_ids).await?;
        Ok(snapshots
            .iter()
            .map(|(id, snapshot)| {
                let count = snapshot
                    .as_ref()
                    .map_or(0, |snapshot| count_distinct_tokens(snapshot, &self.excluded));
                (*id, count)
            })
            .collect())
    }

    /// Distinct-token count for one user.
    pub async fn get_online_count(&self, user_id: UserId) -> Result<usize, PresenceError> {
        let snapshot = self.fetch_snapshot(user_id).await?.unwrap_or_default();
        Ok(count_distinct_tokens(&snapshot, &self.excluded))
    }

    /// `None` when the raw cached value is blank.
    async fn fetch_snapshot(
        &self,
        user_id: UserId,
    ) -> Result<Option<PresenceSnapshot>, PresenceError> {
        let key = cache_key(&self.prefix, user_id);
        let raw = self.cache.get(&key).await?;
        Ok(normalize(raw.as_ref()))
    }

    /// One batched cache request; every distinct id gets an entry, `None` when
    /// its raw value is missing or blank.
    async fn fetch_snapshots(
        &self,
        user_ids: &[UserId],
    ) -> Result<BTreeMap<UserId, Option<PresenceSnapshot>>, PresenceError> {
        let ids: BTreeSet<UserId> = user_ids.iter().copied().collect();
        let keys: Vec<String> = ids.iter().map(|id| cache_key(&self.prefix, *id)).collect();
        let found = self.cache.get_many(&keys).await?;
        debug!(requested = keys.len(), hits = found.len(), "presence snapshots fetched");

        Ok(ids
            .into_iter()
            .zip(keys)
            .map(|(id, key)| (id, normalize(found.get(&key))))
            .collect())
    }
}

fn normalize(raw: Option<&Value>) -> Option<PresenceSnapshot> {
    if is_blank(raw) {
        None
    } else {
        Some(PresenceSnapshot::from_value(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryPresenceCache, StaticSettings};
    use serde_json::json;

    async fn service(mode: Option<i64>) -> (Arc<MemoryPresenceCache>, UserOnlineService) {
        let cache = Arc::new(MemoryPresenceCache::new());
        cache
            .insert(
                "ALIVE_IP_USER_1",
                json!({
                    "node_A_100": {"aliveIps": ["10.0.0.1_A", "10.0.0.2_A"], "lastUpdateAt": 100},
                    "node_B_200": {"aliveIps": ["10.0.0.1_B"], "lastUpdateAt": 200}
                }),
            )
            .await;
        let service = UserOnlineService::new(cache.clone(), Arc::new(StaticSettings::new(mode)));
        (cache, service)
    }

    #[tokio::test]
    async fn listing_is_last_node_wins_in_first_position() {
        let (_, service) = service(Some(0)).await;
        let listing = service.get_user_devices(1).await.unwrap();

        assert_eq!(listing.total_count, 3);
        assert_eq!(listing.devices.len(), 2);
        assert_eq!(listing.devices[0].ip, "10.0.0.1");
        assert_eq!(listing.devices[0].last_seen, Some(json!(200)));
        assert_eq!(listing.devices[0].node_type, "node_B_");
        assert_eq!(listing.devices[1].ip, "10.0.0.2");
        assert_eq!(listing.devices[1].node_type, "node_A_");
    }

    #[tokio::test]
    async fn empty_listing_skips_mode_resolution() {
        let (_, service) = service(Some(9)).await;
        let listing = service.get_user_devices(404).await.unwrap();
        assert_eq!(listing, UserDevices::default());
    }

    #[tokio::test]
    async fn malformed_but_present_value_still_checks_mode() {
        let (cache, service) = service(Some(9)).await;
        cache
            .insert("ALIVE_IP_USER_2", json!({"node_A_100": "garbage"}))
            .await;

        assert!(matches!(
            service.get_user_devices(2).await,
            Err(PresenceError::InvalidDeviceLimitMode(9))
        ));
        assert!(service.get_alive_list(&[2_i64]).await.is_err());
        assert_eq!(service.get_online_count(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn malformed_value_lists_nothing_under_valid_mode() {
        let (cache, service) = service(Some(1)).await;
        cache
            .insert("ALIVE_IP_USER_2", json!({"node_A_100": "garbage"}))
            .await;

        assert_eq!(service.get_user_devices(2).await.unwrap(), UserDevices::default());
        assert!(service.get_alive_list(&[2_i64]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unset_mode_defaults_to_sum_per_node() {
        let (_, service) = service(None).await;
        assert_eq!(service.counting_mode().await.unwrap(), CountingMode::SumPerNode);
    }
}
