// ── Shared publication hub ──
//
// One scheduler + cache pair shared by every coordinator and consumer
// in the process. Handles are passed explicitly; `HubProvider` is the
// single construction point.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::error::CoreError;
use crate::model::DeviceRecord;
use crate::store::{DeviceSnapshot, PublishScheduler};
use crate::stream::DeviceStream;

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Total `stage` calls since construction.
    pub staged: u64,
    /// Total publishes (interval-driven and forced).
    pub published: u64,
    /// Records waiting for the next publish.
    pub pending: usize,
    /// Distinct identities in the published cache.
    pub cached: usize,
    pub interval: Duration,
}

/// Cheaply cloneable handle to the shared deduplicated, rate-limited list.
///
/// All staging and flushing happens under one lock, so a stage and its
/// flush check are atomic with respect to other producers.
#[derive(Clone)]
pub struct PublicationHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    scheduler: Mutex<PublishScheduler>,
    /// Lock-free read side of the published snapshot.
    published: watch::Receiver<DeviceSnapshot>,
}

impl PublicationHub {
    pub fn new(interval: Duration) -> Result<Self, CoreError> {
        let scheduler = PublishScheduler::new(interval)?;
        let published = scheduler.receiver();
        Ok(Self {
            inner: Arc::new(HubInner {
                scheduler: Mutex::new(scheduler),
                published,
            }),
        })
    }

    /// Stage a record and publish if the interval has elapsed.
    pub fn stage_and_maybe_publish(&self, record: DeviceRecord) -> bool {
        self.stage_and_maybe_publish_at(record, Instant::now())
    }

    pub fn stage_and_maybe_publish_at(&self, record: DeviceRecord, now: Instant) -> bool {
        let mut scheduler = self.inner.scheduler.lock();
        scheduler.stage(record);
        scheduler.flush_if_due(now)
    }

    /// Publish any pending records now, regardless of the interval.
    pub fn force_flush(&self) {
        self.force_flush_at(Instant::now());
    }

    pub fn force_flush_at(&self, now: Instant) {
        self.inner.scheduler.lock().force_flush(now);
    }

    /// Publish pending records if due, without staging anything.
    pub fn flush_if_due(&self) -> bool {
        self.inner.scheduler.lock().flush_if_due(Instant::now())
    }

    /// The currently published list. Never observes a partial update.
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.inner.published.borrow().clone()
    }

    pub fn subscribe(&self) -> DeviceStream {
        self.inner.scheduler.lock().subscribe()
    }

    /// Drop every cached and pending record and publish an empty list.
    pub fn clear(&self) {
        self.inner.scheduler.lock().clear();
        debug!("publication hub cleared");
    }

    pub fn interval(&self) -> Duration {
        self.inner.scheduler.lock().interval()
    }

    pub fn stats(&self) -> HubStats {
        let scheduler = self.inner.scheduler.lock();
        HubStats {
            staged: scheduler.staged_total(),
            published: scheduler.published_total(),
            pending: scheduler.pending_len(),
            cached: scheduler.cached_len(),
            interval: scheduler.interval(),
        }
    }

    /// Whether two handles refer to the same hub.
    pub fn same_hub(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

// ── Provider ─────────────────────────────────────────────────────────

/// Single ownership point for the process's [`PublicationHub`].
///
/// Created once at startup and passed to whoever needs a hub. The first
/// successful `initialize` fixes the parameters; later calls return the
/// same hub.
#[derive(Default)]
pub struct HubProvider {
    hub: OnceLock<PublicationHub>,
}

impl HubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct the hub on first call, otherwise return the existing one.
    /// Parameters of later calls are ignored.
    pub fn initialize(&self, interval: Duration) -> Result<PublicationHub, CoreError> {
        if let Some(hub) = self.hub.get() {
            if hub.interval() != interval {
                debug!(
                    requested_ms = interval.as_millis(),
                    active_ms = hub.interval().as_millis(),
                    "hub already initialized, ignoring new interval"
                );
            }
            return Ok(hub.clone());
        }
        let candidate = PublicationHub::new(interval)?;
        Ok(self.hub.get_or_init(|| candidate).clone())
    }

    pub fn get(&self) -> Option<PublicationHub> {
        self.hub.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.hub.get().is_some()
    }

    /// Forget the hub so the next `initialize` builds a fresh one.
    ///
    /// Test isolation only: requires exclusive access, so it cannot be
    /// reached through the shared provider used at runtime.
    #[doc(hidden)]
    pub fn reset(&mut self) {
        self.hub = OnceLock::new();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::PairingState;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn record(addr: &str) -> DeviceRecord {
        DeviceRecord::new(addr.into(), None, -60, PairingState::None)
    }

    #[test]
    fn first_initialize_wins() {
        let provider = HubProvider::new();
        assert!(provider.get().is_none());

        let a = provider.initialize(ms(500)).unwrap();
        let b = provider.initialize(ms(50)).unwrap();
        assert!(a.same_hub(&b));
        assert_eq!(b.interval(), ms(500));
        assert!(provider.get().unwrap().same_hub(&a));
    }

    #[test]
    fn failed_initialize_leaves_provider_empty() {
        let provider = HubProvider::new();
        assert!(provider.initialize(Duration::ZERO).is_err());
        assert!(!provider.is_initialized());
        assert!(provider.initialize(ms(100)).is_ok());
    }

    #[test]
    fn reset_allows_new_parameters() {
        let mut provider = HubProvider::new();
        let first = provider.initialize(ms(500)).unwrap();
        provider.reset();
        let second = provider.initialize(ms(200)).unwrap();
        assert!(!first.same_hub(&second));
        assert_eq!(second.interval(), ms(200));
    }

    #[test]
    fn clones_share_state_and_stats() {
        let t0 = Instant::now();
        let hub = PublicationHub::new(ms(500)).unwrap();
        let other = hub.clone();

        assert!(hub.stage_and_maybe_publish_at(record("aa:01"), t0));
        assert!(!other.stage_and_maybe_publish_at(record("aa:02"), t0 + ms(10)));
        assert_eq!(other.snapshot().len(), 1);

        let stats = hub.stats();
        assert_eq!(stats.staged, 2);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.cached, 1);
        assert_eq!(stats.interval, ms(500));

        other.force_flush_at(t0 + ms(20));
        assert_eq!(hub.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn subscribers_see_each_publish() {
        let t0 = Instant::now();
        let hub = PublicationHub::new(ms(500)).unwrap();
        let mut stream = hub.subscribe();

        hub.stage_and_maybe_publish_at(record("aa:01"), t0);
        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);

        hub.clear();
        let snap = stream.changed().await.unwrap();
        assert!(snap.is_empty());
        assert_eq!(hub.stats().cached, 0);
    }
}
