// ── Refresh tier ──
//
// Low-latency view of every device the discovery path accepted. Accepted
// records are merged quietly; subscribers only hear from the periodic
// task, which re-broadcasts the snapshot each tick even when nothing
// changed. Never talks to the radio.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::model::DeviceRecord;
use crate::store::DeviceSnapshot;
use crate::store::collection::DeviceCollection;
use crate::stream::DeviceStream;

pub(crate) struct RefreshTier {
    devices: Arc<DeviceCollection>,
    period: Duration,
    running: Arc<AtomicBool>,
    active: watch::Sender<bool>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl RefreshTier {
    pub(crate) fn new(period: Duration) -> Self {
        let (active, _) = watch::channel(false);
        Self {
            devices: Arc::new(DeviceCollection::new()),
            period,
            running: Arc::new(AtomicBool::new(false)),
            active,
            task: Mutex::new(None),
        }
    }

    /// Spawn the periodic task on `runtime`. No-op if already running.
    pub(crate) fn start(&self, runtime: &Handle, parent: &CancellationToken) {
        let mut slot = self.task.lock();
        if slot.is_some() {
            return;
        }
        let cancel = parent.child_token();
        self.running.store(true, Ordering::Release);
        let handle = runtime.spawn(refresh_task(
            Arc::clone(&self.devices),
            Arc::clone(&self.running),
            self.period,
            cancel.clone(),
        ));
        *slot = Some((cancel, handle));
        self.active.send_replace(true);
        debug!(period_ms = self.period.as_millis(), "refresh tier started");
    }

    /// Clear the running flag and cancel the task. The cache is kept.
    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some((cancel, _handle)) = self.task.lock().take() {
            cancel.cancel();
            debug!("refresh tier stopped");
        }
        self.active.send_replace(false);
    }

    /// Merge into the cache. Subscribers see it on the next tick.
    pub(crate) fn upsert(&self, record: DeviceRecord) {
        self.devices.merge_quiet(record);
    }

    pub(crate) fn clear(&self) {
        self.devices.clear();
    }

    pub(crate) fn snapshot(&self) -> DeviceSnapshot {
        self.devices.cached()
    }

    pub(crate) fn subscribe(&self) -> DeviceStream {
        self.devices.subscribe()
    }

    pub(crate) fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    pub(crate) fn watch_active(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }
}

async fn refresh_task(
    devices: Arc<DeviceCollection>,
    running: Arc<AtomicBool>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                devices.republish();
                trace!(devices = devices.len(), "refresh tick");
            }
        }
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

    #[tokio::test(start_paused = true)]
    async fn re_emits_every_period_until_stopped() {
        let root = CancellationToken::new();
        let tier = RefreshTier::new(Duration::from_secs(1));
        tier.upsert(record("aa:01"));
        let mut stream = tier.subscribe();

        tier.start(&Handle::current(), &root);
        assert!(tier.is_active());

        // Unchanged content still wakes the subscriber on every tick.
        for _ in 0..3 {
            let snap = tokio::time::timeout(Duration::from_millis(1500), stream.changed())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(snap.len(), 1);
        }

        tier.stop();
        assert!(!tier.is_active());
        let quiet = tokio::time::timeout(Duration::from_secs(5), stream.changed()).await;
        assert!(quiet.is_err(), "no emission after stop");
        assert_eq!(tier.snapshot().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn upsert_is_only_broadcast_on_tick() {
        let root = CancellationToken::new();
        let tier = RefreshTier::new(Duration::from_secs(1));
        let mut stream = tier.subscribe();
        tier.start(&Handle::current(), &root);

        tier.upsert(record("aa:01"));
        tier.upsert(record("aa:02"));
        assert!(stream.latest().is_empty());
        assert_eq!(tier.snapshot().len(), 2);

        let early = tokio::time::timeout(Duration::from_millis(500), stream.changed()).await;
        assert!(early.is_err(), "no emission before the first tick");

        let snap = tokio::time::timeout(Duration::from_millis(600), stream.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.len(), 2);
        tier.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_ends_task() {
        let root = CancellationToken::new();
        let tier = RefreshTier::new(Duration::from_millis(200));
        let mut stream = tier.subscribe();
        tier.start(&Handle::current(), &root);

        root.cancel();
        let quiet = tokio::time::timeout(Duration::from_secs(2), stream.changed()).await;
        assert!(quiet.is_err());
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let root = CancellationToken::new();
        let tier = RefreshTier::new(Duration::from_secs(1));
        tier.start(&Handle::current(), &root);
        tier.start(&Handle::current(), &root);
        tier.stop();
        tier.stop();
        assert!(!tier.is_active());
    }
}
