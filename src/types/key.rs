//! Synchronization keys naming a serialized resource.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A `(resource-kind, resource-id)` pair identifying one mutual-exclusion domain.
///
/// Keys order lexicographically by kind, then id. Multi-key acquisition
/// always follows this order, so two jobs can never wait on each other in
/// opposite directions.
///
/// # Examples
///
/// ```
/// use jobsync::SyncKey;
///
/// let key: SyncKey = "lb:42".parse().unwrap();
/// assert_eq!(key, SyncKey::new("lb", "42"));
/// assert_eq!(key.to_string(), "lb:42");
/// assert!(SyncKey::new("lb", "42") < SyncKey::new("vm", "1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncKey {
    /// Resource kind, e.g. `lb` or `vm`.
    pub kind: String,
    /// Resource identifier within the kind.
    pub id: String,
}

impl SyncKey {
    /// Creates a key from a kind and an id.
    pub fn new(kind: impl Into<String>, id: impl ToString) -> Self {
        Self {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    /// Sorts and deduplicates keys into canonical acquisition order.
    pub fn normalize(mut keys: Vec<SyncKey>) -> Vec<SyncKey> {
        keys.sort();
        keys.dedup();
        keys
    }
}

impl fmt::Display for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Error parsing a [`SyncKey`] from its `kind:id` form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid sync key '{0}': expected 'kind:id'")]
pub struct ParseSyncKeyError(String);

impl FromStr for SyncKey {
    type Err = ParseSyncKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((kind, id)) if !kind.is_empty() && !id.is_empty() => Ok(Self::new(kind, id)),
            _ => Err(ParseSyncKeyError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_missing_parts() {
        assert!("lb".parse::<SyncKey>().is_err());
        assert!(":42".parse::<SyncKey>().is_err());
        assert!("lb:".parse::<SyncKey>().is_err());
    }

    #[test]
    fn id_may_contain_colons() {
        let key: SyncKey = "volume:pool:7".parse().unwrap();
        assert_eq!(key.kind, "volume");
        assert_eq!(key.id, "pool:7");
    }

    #[test]
    fn normalize_orders_by_kind_then_id() {
        let keys = SyncKey::normalize(vec![
            SyncKey::new("vm", "2"),
            SyncKey::new("lb", "9"),
            SyncKey::new("vm", "10"),
            SyncKey::new("lb", "9"),
        ]);
        assert_eq!(
            keys,
            vec![
                SyncKey::new("lb", "9"),
                SyncKey::new("vm", "10"),
                SyncKey::new("vm", "2"),
            ]
        );
    }
}
