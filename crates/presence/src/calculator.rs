//! Device counting policies
//!
//! Two policies live here and are kept apart on purpose: the mode-aware
//! [`count_devices`] used by the alive list, device listing and standalone
//! calculation, and [`count_distinct_tokens`] used by the single and batch
//! online-count lookups. They can disagree for the same snapshot.

use crate::error::PresenceError;
use crate::snapshot::{device_identity, PresenceSnapshot};
use std::collections::HashSet;
use std::fmt;

/// Counting policy selected by the `device_limit_mode` setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CountingMode {
    /// Mode `0`: count each node's devices on its own and add them up.
    #[default]
    SumPerNode,
    /// Mode `1`: one device per distinct identity across all nodes.
    GlobalDedup,
}

impl CountingMode {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::SumPerNode => 0,
            Self::GlobalDedup => 1,
        }
    }
}

impl TryFrom<i64> for CountingMode {
    type Error = PresenceError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::SumPerNode),
            1 => Ok(Self::GlobalDedup),
            other => Err(PresenceError::InvalidDeviceLimitMode(other)),
        }
    }
}

impl fmt::Display for CountingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SumPerNode => write!(f, "sum-per-node"),
            Self::GlobalDedup => write!(f, "global-dedup"),
        }
    }
}

/// Device identities left out of every count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludedIps(HashSet<String>);

impl ExcludedIps {
    pub fn new<I, S>(ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(ips.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.0.contains(identity)
    }

    /// Whether a raw token's identity is excluded.
    pub fn excludes_token(&self, token: &str) -> bool {
        self.contains(device_identity(token))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Mode-aware device count for one snapshot.
pub fn count_devices(
    snapshot: &PresenceSnapshot,
    mode: CountingMode,
    excluded: &ExcludedIps,
) -> usize {
    match mode {
        CountingMode::SumPerNode => snapshot
            .nodes()
            .iter()
            .map(|(_, record)| {
                record
                    .identities()
                    .filter(|ip| !excluded.contains(ip))
                    .count()
            })
            .sum(),
        CountingMode::GlobalDedup => {
            // Per-node dedup followed by a global one collapses to a single set.
            let distinct: HashSet<&str> = snapshot
                .nodes()
                .iter()
                .flat_map(|(_, record)| record.identities())
                .filter(|ip| !excluded.contains(ip))
                .collect();
            distinct.len()
        }
    }
}

/// Distinct raw tokens across all nodes, ignoring the counting mode.
///
/// Deduplication is on the full `<ip>_<suffix>` token, so one IP seen by two
/// nodes counts twice here while [`CountingMode::GlobalDedup`] counts it once.
pub fn count_distinct_tokens(snapshot: &PresenceSnapshot, excluded: &ExcludedIps) -> usize {
    let distinct: HashSet<&str> = snapshot
        .tokens()
        .filter(|token| !excluded.excludes_token(token))
        .collect();
    distinct.len()
}
