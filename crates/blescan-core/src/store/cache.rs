// ── Ordered device cache ──
//
// Latest record per identity. Existing identities are updated in place,
// new identities are appended, nothing ever expires.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::model::{DeviceIdentity, DeviceRecord};

/// An immutable, cheaply cloneable view of a device list.
pub type DeviceSnapshot = Arc<Vec<Arc<DeviceRecord>>>;

/// Keyed store of the latest known record per device identity.
///
/// Not synchronized: owners wrap it in their own lock.
#[derive(Debug, Default)]
pub struct DeviceCache {
    by_identity: IndexMap<DeviceIdentity, Arc<DeviceRecord>>,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the full record for its identity, or append it.
    /// Returns `true` if the identity was not cached before.
    pub fn merge(&mut self, record: DeviceRecord) -> bool {
        let key = record.identity.clone();
        // `IndexMap::insert` keeps the original slot for an existing key.
        self.by_identity.insert(key, Arc::new(record)).is_none()
    }

    /// Records in first-seen order.
    pub fn snapshot(&self) -> DeviceSnapshot {
        Arc::new(self.by_identity.values().cloned().collect())
    }

    pub fn get(&self, identity: &DeviceIdentity) -> Option<Arc<DeviceRecord>> {
        self.by_identity.get(identity).cloned()
    }

    pub fn contains(&self, identity: &DeviceIdentity) -> bool {
        self.by_identity.contains_key(identity)
    }

    pub fn clear(&mut self) {
        self.by_identity.clear();
    }

    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::PairingState;

    fn record(addr: &str, rssi: i16) -> DeviceRecord {
        DeviceRecord::new(addr.into(), Some(format!("dev {addr}")), rssi, PairingState::None)
    }

    fn order(cache: &DeviceCache) -> Vec<String> {
        cache
            .snapshot()
            .iter()
            .map(|r| r.identity.to_string())
            .collect()
    }

    #[test]
    fn merge_reports_new_identity() {
        let mut cache = DeviceCache::new();
        assert!(cache.merge(record("aa:01", -50)));
        assert!(!cache.merge(record("AA:01", -51)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn merging_identical_record_is_idempotent() {
        let mut cache = DeviceCache::new();
        let a = record("aa:01", -50);
        cache.merge(a.clone());
        cache.merge(record("aa:02", -60));
        let before = order(&cache);

        cache.merge(a);
        assert_eq!(order(&cache), before);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn update_replaces_in_place_without_moving() {
        let mut cache = DeviceCache::new();
        cache.merge(record("aa:01", -50));
        cache.merge(record("aa:02", -60));
        cache.merge(record("aa:03", -70));

        cache.merge(record("aa:01", -40));
        assert_eq!(order(&cache), vec!["aa:01", "aa:02", "aa:03"]);
        assert_eq!(
            cache
                .get(&DeviceIdentity::new("aa:01"))
                .unwrap()
                .signal_strength,
            -40
        );
    }

    #[test]
    fn replacement_is_wholesale() {
        let mut cache = DeviceCache::new();
        cache.merge(DeviceRecord::new("aa:01".into(), Some("Named".into()), -50, PairingState::Bonded));
        cache.merge(DeviceRecord::new("aa:01".into(), None, -55, PairingState::None));

        let rec = cache.get(&DeviceIdentity::new("aa:01")).unwrap();
        assert!(!rec.has_name());
        assert_eq!(rec.pairing_state, PairingState::None);
    }

    #[test]
    fn clear_drops_everything() {
        let mut cache = DeviceCache::new();
        cache.merge(record("aa:01", -50));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.snapshot().is_empty());
        assert!(!cache.contains(&DeviceIdentity::new("aa:01")));
    }
}
