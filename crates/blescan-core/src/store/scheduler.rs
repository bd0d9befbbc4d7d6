// ── Debounced publish scheduler ──
//
// Staged records accumulate in a pending buffer keyed by identity and are
// merged into the cache and published only when the interval has elapsed
// (or on a forced flush). Between two flushes the published snapshot is
// never touched.

use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::trace;

use super::cache::{DeviceCache, DeviceSnapshot};
use crate::error::CoreError;
use crate::model::{DeviceIdentity, DeviceRecord};
use crate::stream::DeviceStream;

pub struct PublishScheduler {
    interval: Duration,
    /// Records staged since the last publish, in first-staged order.
    pending: IndexMap<DeviceIdentity, DeviceRecord>,
    last_publish: Option<Instant>,
    cache: DeviceCache,
    published: watch::Sender<DeviceSnapshot>,
    staged_total: u64,
    published_total: u64,
}

impl PublishScheduler {
    /// Create a scheduler. A zero interval is a configuration error.
    pub fn new(interval: Duration) -> Result<Self, CoreError> {
        if interval.is_zero() {
            return Err(CoreError::Config {
                message: "publish interval must be greater than zero".into(),
            });
        }
        let (published, _) = watch::channel(DeviceSnapshot::default());
        Ok(Self {
            interval,
            pending: IndexMap::new(),
            last_publish: None,
            cache: DeviceCache::new(),
            published,
            staged_total: 0,
            published_total: 0,
        })
    }

    /// Buffer a record, overwriting any unpublished record for the same identity.
    pub fn stage(&mut self, record: DeviceRecord) {
        self.staged_total += 1;
        self.pending.insert(record.identity.clone(), record);
    }

    /// Publish if the buffer is non-empty and the interval has elapsed
    /// (or nothing was ever published). Returns whether a publish happened.
    pub fn flush_if_due(&mut self, now: Instant) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let due = self
            .last_publish
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if !due {
            return false;
        }
        self.publish(now);
        true
    }

    /// Publish unconditionally, ignoring the interval.
    pub fn force_flush(&mut self, now: Instant) {
        self.publish(now);
    }

    fn publish(&mut self, now: Instant) {
        let flushed = self.pending.len();
        for (_, record) in self.pending.drain(..) {
            self.cache.merge(record);
        }
        let snap = self.cache.snapshot();
        // `send_replace` stores the value even with zero receivers.
        self.published.send_replace(snap);
        self.last_publish = Some(now);
        self.published_total += 1;
        trace!(flushed, cached = self.cache.len(), "snapshot published");
    }

    /// Drop cache and buffer, publish an empty list, and forget the last
    /// publish time so the next staged record publishes immediately.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.cache.clear();
        self.last_publish = None;
        self.published.send_replace(DeviceSnapshot::default());
    }

    /// The currently published snapshot.
    pub fn published(&self) -> DeviceSnapshot {
        self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.published.subscribe())
    }

    pub(crate) fn receiver(&self) -> watch::Receiver<DeviceSnapshot> {
        self.published.subscribe()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_publish(&self) -> Option<Instant> {
        self.last_publish
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn staged_total(&self) -> u64 {
        self.staged_total
    }

    pub fn published_total(&self) -> u64 {
        self.published_total
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::PairingState;
    use pretty_assertions::assert_eq;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn record(addr: &str, rssi: i16) -> DeviceRecord {
        DeviceRecord::new(addr.into(), None, rssi, PairingState::None)
    }

    fn ids(snap: &DeviceSnapshot) -> Vec<String> {
        snap.iter().map(|r| r.identity.to_string()).collect()
    }

    #[test]
    fn zero_interval_is_config_error() {
        assert!(matches!(
            PublishScheduler::new(Duration::ZERO),
            Err(CoreError::Config { .. })
        ));
    }

    #[test]
    fn scenario_publishes_first_then_waits_for_interval() {
        let t0 = Instant::now();
        let mut sched = PublishScheduler::new(ms(500)).unwrap();

        sched.stage(record("aa:0a", -50));
        assert!(sched.flush_if_due(t0));
        assert_eq!(ids(&sched.published()), vec!["aa:0a"]);

        sched.stage(record("aa:0b", -60));
        assert!(!sched.flush_if_due(t0 + ms(100)));
        assert_eq!(ids(&sched.published()), vec!["aa:0a"]);

        assert!(sched.flush_if_due(t0 + ms(600)));
        assert_eq!(ids(&sched.published()), vec!["aa:0a", "aa:0b"]);
    }

    #[test]
    fn rate_is_bounded_by_interval() {
        let t0 = Instant::now();
        let mut sched = PublishScheduler::new(ms(500)).unwrap();

        for i in 0..1000u64 {
            sched.stage(record(&format!("dev:{i:04}"), -70));
            sched.flush_if_due(t0 + Duration::from_micros(i * 10));
        }
        assert_eq!(sched.published_total(), 1);
        assert_eq!(sched.published().len(), 1);
        assert_eq!(sched.pending_len(), 999);

        assert!(!sched.flush_if_due(t0 + ms(499)));
        assert!(sched.flush_if_due(t0 + ms(500)));
        assert_eq!(sched.published_total(), 2);
        assert_eq!(sched.published().len(), 1000);
        assert_eq!(sched.staged_total(), 1000);
    }

    #[test]
    fn empty_buffer_is_never_due() {
        let t0 = Instant::now();
        let mut sched = PublishScheduler::new(ms(500)).unwrap();
        assert!(!sched.flush_if_due(t0));
        assert!(sched.last_publish().is_none());
        assert_eq!(sched.published_total(), 0);

        sched.stage(record("aa:01", -50));
        assert!(sched.flush_if_due(t0 + ms(10)));
        assert!(!sched.flush_if_due(t0 + ms(10_000)));
        assert_eq!(sched.last_publish(), Some(t0 + ms(10)));
    }

    #[test]
    fn staging_overwrites_unpublished_record() {
        let t0 = Instant::now();
        let mut sched = PublishScheduler::new(ms(500)).unwrap();
        sched.stage(record("aa:01", -50));
        sched.stage(record("AA:01", -42));
        assert_eq!(sched.pending_len(), 1);

        sched.force_flush(t0);
        let snap = sched.published();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].signal_strength, -42);
    }

    #[test]
    fn published_snapshot_is_untouched_between_flushes() {
        let t0 = Instant::now();
        let mut sched = PublishScheduler::new(ms(500)).unwrap();
        sched.stage(record("aa:01", -50));
        sched.flush_if_due(t0);
        let before = sched.published();

        sched.stage(record("aa:01", -30));
        sched.stage(record("aa:02", -30));
        let after = sched.published();
        assert!(std::sync::Arc::ptr_eq(&before, &after));
        assert_eq!(after[0].signal_strength, -50);
    }

    #[test]
    fn force_flush_ignores_interval_and_preserves_order() {
        let t0 = Instant::now();
        let mut sched = PublishScheduler::new(ms(500)).unwrap();
        sched.stage(record("aa:01", -50));
        sched.flush_if_due(t0);

        sched.stage(record("aa:02", -60));
        sched.stage(record("aa:01", -55));
        sched.force_flush(t0 + ms(1));
        assert_eq!(ids(&sched.published()), vec!["aa:01", "aa:02"]);
        assert_eq!(sched.published()[0].signal_strength, -55);
        assert_eq!(sched.last_publish(), Some(t0 + ms(1)));
    }

    #[test]
    fn clear_resets_to_first_publish() {
        let t0 = Instant::now();
        let mut sched = PublishScheduler::new(ms(500)).unwrap();
        sched.stage(record("aa:01", -50));
        sched.flush_if_due(t0);
        sched.clear();
        assert!(sched.published().is_empty());

        sched.stage(record("aa:02", -50));
        assert!(sched.flush_if_due(t0 + ms(1)));
        assert_eq!(ids(&sched.published()), vec!["aa:02"]);
    }
}
