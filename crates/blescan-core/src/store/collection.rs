// ── Reactive device collection ──
//
// A `DeviceCache` behind a lock, with push-based change notification
// via a `watch` channel. Every mutation rebuilds the snapshot that
// subscribers receive.

use parking_lot::Mutex;
use tokio::sync::watch;

use super::cache::{DeviceCache, DeviceSnapshot};
use crate::model::{DeviceIdentity, DeviceRecord};
use crate::stream::DeviceStream;

/// Shared, observable device list used by the discovery side of the
/// coordinator and by the refresh tier.
pub(crate) struct DeviceCollection {
    cache: Mutex<DeviceCache>,
    snapshot: watch::Sender<DeviceSnapshot>,
}

impl DeviceCollection {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(DeviceSnapshot::default());
        Self {
            cache: Mutex::new(DeviceCache::new()),
            snapshot,
        }
    }

    /// Merge a record and broadcast. Returns `true` if the identity was new.
    pub(crate) fn upsert(&self, record: DeviceRecord) -> bool {
        let mut cache = self.cache.lock();
        let is_new = cache.merge(record);
        let snap = cache.snapshot();
        // `send_replace` updates unconditionally, even with zero receivers.
        self.snapshot.send_replace(snap);
        is_new
    }

    /// Merge a record without notifying subscribers. The change becomes
    /// visible on the next `republish`.
    pub(crate) fn merge_quiet(&self, record: DeviceRecord) -> bool {
        self.cache.lock().merge(record)
    }

    /// Re-broadcast the current snapshot without changing it.
    pub(crate) fn republish(&self) {
        let snap = self.cache.lock().snapshot();
        self.snapshot.send_replace(snap);
    }

    pub(crate) fn contains(&self, identity: &DeviceIdentity) -> bool {
        self.cache.lock().contains(identity)
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> DeviceSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Current cache contents, including quiet merges not yet broadcast.
    pub(crate) fn cached(&self) -> DeviceSnapshot {
        self.cache.lock().snapshot()
    }

    pub(crate) fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.snapshot.subscribe())
    }

    pub(crate) fn clear(&self) {
        let mut cache = self.cache.lock();
        cache.clear();
        self.snapshot.send_replace(cache.snapshot());
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.lock().len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::PairingState;

    fn record(addr: &str) -> DeviceRecord {
        DeviceRecord::new(addr.into(), None, -60, PairingState::None)
    }

    #[test]
    fn upsert_broadcasts_snapshot() {
        let col = DeviceCollection::new();
        let stream = col.subscribe();
        assert!(stream.current().is_empty());

        assert!(col.upsert(record("aa:01")));
        assert!(!col.upsert(record("aa:01")));
        assert_eq!(stream.latest().len(), 1);
        assert_eq!(col.len(), 1);
    }

    #[tokio::test]
    async fn republish_wakes_subscribers() {
        let col = DeviceCollection::new();
        col.upsert(record("aa:01"));
        let mut stream = col.subscribe();

        col.republish();
        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn quiet_merge_waits_for_republish() {
        let col = DeviceCollection::new();
        let stream = col.subscribe();
        assert!(col.merge_quiet(record("aa:01")));
        assert!(stream.latest().is_empty());
        assert_eq!(col.cached().len(), 1);

        col.republish();
        assert_eq!(stream.latest().len(), 1);
    }

    #[test]
    fn clear_empties_snapshot() {
        let col = DeviceCollection::new();
        col.upsert(record("aa:01"));
        col.clear();
        assert!(col.snapshot().is_empty());
        assert!(!col.contains(&DeviceIdentity::new("aa:01")));
    }
}
