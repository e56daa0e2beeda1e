//! Presence snapshots
//!
//! A snapshot is the raw cached value for one user: an object keyed by node,
//! each entry holding the device tokens that node currently sees. Producers are
//! not trusted to write well-formed entries, so decoding is lenient: anything
//! that does not look like a node record is dropped.

use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

/// One node's view of a user's alive devices.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    /// Device tokens of the form `<ip>_<nodeSuffix>`
    pub alive_ips: Vec<String>,

    /// Last heartbeat time, kept opaque
    pub last_update_at: Option<Value>,
}

/// Node entry as producers write it. Both spellings may be present at once;
/// the lower-cased one wins.
#[derive(Debug, Deserialize)]
struct WireNodeRecord {
    #[serde(default)]
    aliveips: Option<Vec<String>>,
    #[serde(rename = "aliveIps", default)]
    alive_ips: Option<Vec<String>>,
    #[serde(rename = "lastupdateAt", default)]
    lastupdate_at: Option<Value>,
    #[serde(rename = "lastUpdateAt", default)]
    last_update_at: Option<Value>,
}

impl NodeRecord {
    pub fn new(alive_ips: Vec<String>, last_update_at: Option<Value>) -> Self {
        Self {
            alive_ips,
            last_update_at,
        }
    }

    /// Decode one node entry; `None` unless it is an object with a device list.
    pub fn from_value(entry: &Value) -> Result<Option<Self>, serde_json::Error> {
        let wire = WireNodeRecord::deserialize(entry)?;
        Ok(wire.aliveips.or(wire.alive_ips).map(|alive_ips| Self {
            alive_ips,
            last_update_at: wire.lastupdate_at.or(wire.last_update_at),
        }))
    }

    /// Device identities in token order, duplicates kept.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.alive_ips.iter().map(|token| device_identity(token))
    }

    /// `lastUpdateAt` rendered the way node keys embed it.
    pub fn last_update_label(&self) -> String {
        match &self.last_update_at {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(true)) => "1".to_string(),
            _ => String::new(),
        }
    }

    /// Node key with the timestamp suffix removed.
    ///
    /// Everything before the first occurrence of the rendered `lastUpdateAt`.
    /// A missing timestamp, or one that does not occur in the key, leaves the
    /// key untouched.
    pub fn node_type(&self, node_key: &str) -> String {
        let label = self.last_update_label();
        if label.is_empty() {
            return node_key.to_string();
        }
        match node_key.find(&label) {
            Some(idx) => node_key[..idx].to_string(),
            None => node_key.to_string(),
        }
    }
}

/// Device identity of a token: the part before the first `_`.
///
/// A token without `_` is its own identity.
pub fn device_identity(token: &str) -> &str {
    token.split_once('_').map_or(token, |(ip, _)| ip)
}

/// Whether a raw cached value counts as "no presence data" before any
/// normalization: absent, null, false, zero, an empty string or `"0"`, or an
/// empty array or object.
pub fn is_blank(raw: Option<&Value>) -> bool {
    match raw {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty() || s == "0",
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(entries)) => entries.is_empty(),
        Some(_) => false,
    }
}

/// Normalized per-user presence data, in the order the cache stored it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceSnapshot {
    nodes: Vec<(String, NodeRecord)>,
}

impl PresenceSnapshot {
    pub fn new(nodes: Vec<(String, NodeRecord)>) -> Self {
        Self { nodes }
    }

    /// Normalize a raw cached value.
    ///
    /// Absent values, non-objects and entries that fail to decode as a
    /// [`NodeRecord`] all degrade to "no data"; this never fails.
    pub fn from_value(raw: Option<&Value>) -> Self {
        let Some(Value::Object(entries)) = raw else {
            return Self::default();
        };

        let nodes = entries
            .iter()
            .filter_map(|(node_key, entry)| {
                if !entry.is_object() {
                    trace!(node_key = %node_key, "skipping non-object presence entry");
                    return None;
                }
                match NodeRecord::from_value(entry) {
                    Ok(Some(record)) => Some((node_key.clone(), record)),
                    Ok(None) => {
                        trace!(node_key = %node_key, "skipping node record without device list");
                        None
                    }
                    Err(err) => {
                        trace!(node_key = %node_key, error = %err, "skipping malformed node record");
                        None
                    }
                }
            })
            .collect();

        Self { nodes }
    }

    pub fn nodes(&self) -> &[(String, NodeRecord)] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All device tokens across nodes, in node order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .flat_map(|(_, record)| record.alive_ips.iter().map(String::as_str))
    }
}

impl From<&Value> for PresenceSnapshot {
    fn from(raw: &Value) -> Self {
        Self::from_value(Some(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_is_prefix_before_first_underscore() {
        assert_eq!(device_identity("10.0.0.1_A"), "10.0.0.1");
        assert_eq!(device_identity("10.0.0.1_A_B"), "10.0.0.1");
        assert_eq!(device_identity("10.0.0.1"), "10.0.0.1");
        assert_eq!(device_identity("_A"), "");
    }

    #[test]
    fn malformed_entries_are_dropped() {
        let raw = json!({
            "node_A_100": {"aliveIps": ["10.0.0.1_A"], "lastUpdateAt": 100},
            "node_B_100": {"lastUpdateAt": 100},
            "node_C_100": "garbage",
            "node_D_100": {"aliveIps": "not-a-list"},
            "node_E_100": {"aliveIps": [1, 2]},
            "node_F_100": [1, 2, 3]
        });

        let snapshot = PresenceSnapshot::from(&raw);
        assert_eq!(snapshot.nodes().len(), 1);
        assert_eq!(snapshot.nodes()[0].0, "node_A_100");
    }

    #[test]
    fn lowercase_field_spelling_is_accepted() {
        let raw = json!({
            "node_A_7": {"aliveips": ["1.1.1.1_A"], "lastupdateAt": 7}
        });

        let snapshot = PresenceSnapshot::from(&raw);
        let (_, record) = &snapshot.nodes()[0];
        assert_eq!(record.alive_ips, vec!["1.1.1.1_A".to_string()]);
        assert_eq!(record.last_update_at, Some(json!(7)));
    }

    #[test]
    fn both_field_spellings_in_one_record() {
        let raw = json!({
            "n_1": {
                "aliveIps": ["9.9.9.9_B"],
                "aliveips": ["1.1.1.1_A"],
                "lastUpdateAt": 1,
                "lastupdateAt": 2
            }
        });

        let snapshot = PresenceSnapshot::from(&raw);
        assert_eq!(snapshot.nodes().len(), 1);
        let (_, record) = &snapshot.nodes()[0];
        assert_eq!(record.alive_ips, vec!["1.1.1.1_A".to_string()]);
        assert_eq!(record.last_update_at, Some(json!(2)));
    }

    #[test]
    fn camel_case_fields_fill_in_for_missing_lowercase() {
        let raw = json!({
            "n_1": {"aliveips": null, "aliveIps": ["2.2.2.2_A"], "lastUpdateAt": 5}
        });

        let snapshot = PresenceSnapshot::from(&raw);
        let (_, record) = &snapshot.nodes()[0];
        assert_eq!(record.alive_ips, vec!["2.2.2.2_A".to_string()]);
        assert_eq!(record.last_update_at, Some(json!(5)));
    }

    #[test]
    fn non_object_values_are_empty() {
        assert!(PresenceSnapshot::from_value(None).is_empty());
        assert!(PresenceSnapshot::from(&Value::Null).is_empty());
        assert!(PresenceSnapshot::from(&json!([])).is_empty());
        assert!(PresenceSnapshot::from(&json!({})).is_empty());
        assert!(PresenceSnapshot::from(&json!("x")).is_empty());
    }

    #[test]
    fn blank_raw_values() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&Value::Null)));
        assert!(is_blank(Some(&json!({}))));
        assert!(is_blank(Some(&json!([]))));
        assert!(is_blank(Some(&json!(""))));
        assert!(is_blank(Some(&json!(0))));

        // Present but malformed is not blank, even though it normalizes to nothing.
        let malformed = json!({"n_1": "garbage"});
        assert!(!is_blank(Some(&malformed)));
        assert!(PresenceSnapshot::from(&malformed).is_empty());
    }

    #[test]
    fn node_order_follows_cache_value() {
        let raw = json!({
            "z_1": {"aliveIps": []},
            "a_1": {"aliveIps": []},
            "m_1": {"aliveIps": []}
        });

        let keys: Vec<_> = PresenceSnapshot::from(&raw)
            .nodes()
            .iter()
            .map(|(key, _)| key.clone())
            .collect();
        assert_eq!(keys, vec!["z_1", "a_1", "m_1"]);
    }

    #[test]
    fn node_type_strips_timestamp_suffix() {
        let record = NodeRecord::new(vec![], Some(json!(1700000000)));
        assert_eq!(record.node_type("vmess1700000000"), "vmess");
        assert_eq!(record.node_type("other"), "other");

        let text = NodeRecord::new(vec![], Some(json!("ts")));
        assert_eq!(text.node_type("node_ts"), "node_");

        let missing = NodeRecord::new(vec![], None);
        assert_eq!(missing.node_type("node_A_100"), "node_A_100");
    }
}
