// ── Scan coordinator ──
//
// Drives the radio through discovery cycles, filters and normalizes each
// observation, and feeds three sinks: its own discovery list, the shared
// publication hub, and the refresh tier. All radio events arrive through
// one bounded channel drained by a single worker task.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::radio::{DiscoveryEvent, RadioError, RadioEvent, RadioScanner};
use super::refresh::RefreshTier;
use crate::config::ScanConfig;
use crate::error::{CapabilityFault, CoreError};
use crate::filter::FilterEngine;
use crate::hub::PublicationHub;
use crate::model::DeviceIdentity;
use crate::store::DeviceSnapshot;
use crate::store::collection::DeviceCollection;
use crate::stream::DeviceStream;

/// Externally visible scanning state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanState {
    #[default]
    Idle,
    Discovering,
}

// ── ScanCoordinator ──────────────────────────────────────────────────

/// Owns one scanning session against a [`RadioScanner`].
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Must be used from within
/// a tokio runtime; `start` spawns the event worker and refresh task on the
/// current runtime. Call [`cleanup`](Self::cleanup) before discarding it.
#[derive(Clone)]
pub struct ScanCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: ScanConfig,
    radio: Arc<dyn RadioScanner>,
    filter: Arc<FilterEngine>,
    hub: PublicationHub,
    discovered: DeviceCollection,
    refresh: RefreshTier,
    /// Serializes start/stop/cleanup and the cycle-finished restart.
    lifecycle: Mutex<()>,
    session: Mutex<Session>,
    state: watch::Sender<ScanState>,
    last_error: watch::Sender<Option<String>>,
    continue_scanning: AtomicBool,
    listening: AtomicBool,
    listener: Mutex<Option<ListenerTask>>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Session {
    state: ScanState,
    tracked: HashSet<DeviceIdentity>,
    last_tracked_flush: Option<Instant>,
}

struct ListenerTask {
    cancel: CancellationToken,
    _handle: JoinHandle<()>,
}

impl Drop for CoordinatorInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ScanCoordinator {
    pub fn new(
        config: ScanConfig,
        radio: Arc<dyn RadioScanner>,
        filter: Arc<FilterEngine>,
        hub: PublicationHub,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        if config.tracked_min_interval >= hub.interval() {
            return Err(CoreError::Config {
                message: format!(
                    "tracked interval ({:?}) must be shorter than the hub publish interval ({:?})",
                    config.tracked_min_interval,
                    hub.interval()
                ),
            });
        }
        let (state, _) = watch::channel(ScanState::Idle);
        let (last_error, _) = watch::channel(None);
        let refresh = RefreshTier::new(config.refresh_period);

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                config,
                radio,
                filter,
                hub,
                discovered: DeviceCollection::new(),
                refresh,
                lifecycle: Mutex::new(()),
                session: Mutex::new(Session::default()),
                state,
                last_error,
                continue_scanning: AtomicBool::new(false),
                listening: AtomicBool::new(false),
                listener: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Begin continuous discovery.
    ///
    /// Fails with [`CoreError::Capability`] if the radio cannot scan and
    /// with [`CoreError::TransientStart`] if it rejects the request; both
    /// leave the coordinator idle. Starting while discovering is a no-op.
    pub fn start(&self) -> Result<(), CoreError> {
        let _lifecycle = self.inner.lifecycle.lock();

        if self.inner.session.lock().state == ScanState::Discovering {
            debug!("start requested while discovering, ignoring");
            return Ok(());
        }

        if let Err(fault) = self.check_capabilities() {
            let err = CoreError::from(fault);
            warn!(error = %err, "cannot start discovery");
            self.record_error(&err);
            return Err(err);
        }

        let runtime = Handle::try_current().map_err(|_| {
            CoreError::Internal("scan coordinator requires a tokio runtime".into())
        })?;

        self.inner.session.lock().last_tracked_flush = None;
        self.inner.last_error.send_replace(None);
        self.inner.continue_scanning.store(true, Ordering::Release);
        self.inner.refresh.start(&runtime, &self.inner.cancel);
        self.listen(&runtime);

        if let Err(e) = self.inner.radio.begin_discovery() {
            self.inner.continue_scanning.store(false, Ordering::Release);
            self.inner.refresh.stop();
            self.unlisten();
            self.set_state(ScanState::Idle);
            let err = CoreError::TransientStart {
                message: e.to_string(),
            };
            warn!(error = %err, "discovery start rejected, rolled back");
            self.record_error(&err);
            return Err(err);
        }

        self.set_state(ScanState::Discovering);
        info!("discovery started");
        Ok(())
    }

    /// Stop discovery and publish whatever is pending.
    ///
    /// The stop always completes. A cancel failure other than "not
    /// running" is recorded and returned after the coordinator is idle.
    pub fn stop(&self) -> Result<(), CoreError> {
        let _lifecycle = self.inner.lifecycle.lock();
        self.stop_locked()
    }

    fn stop_locked(&self) -> Result<(), CoreError> {
        self.inner.continue_scanning.store(false, Ordering::Release);

        let result = match self.inner.radio.cancel_discovery() {
            Ok(()) | Err(RadioError::NotRunning) => Ok(()),
            Err(e) => {
                let err = CoreError::TransientStart {
                    message: format!("cancel failed: {e}"),
                };
                warn!(error = %err, "radio refused to cancel discovery");
                self.record_error(&err);
                Err(err)
            }
        };

        self.inner.refresh.stop();
        self.inner.hub.force_flush();
        self.set_state(ScanState::Idle);
        info!("discovery stopped");
        result
    }

    /// Stop, detach from the radio and drop every list and tracked device.
    /// Events still in flight afterwards are ignored. Safe to call twice.
    pub fn cleanup(&self) {
        let _lifecycle = self.inner.lifecycle.lock();
        if let Err(e) = self.stop_locked() {
            debug!(error = %e, "stop during cleanup reported an error");
        }
        self.unlisten();

        self.inner.discovered.clear();
        self.inner.refresh.clear();
        self.inner.hub.clear();
        {
            let mut session = self.inner.session.lock();
            session.tracked.clear();
            session.last_tracked_flush = None;
        }
        debug!("scan coordinator cleaned up");
    }

    /// Empty the discovery list, hub and refresh cache. Scanning continues.
    pub fn clear(&self) {
        self.inner.discovered.clear();
        self.inner.refresh.clear();
        self.inner.hub.clear();
        debug!("device lists cleared");
    }

    // ── Tracked devices ──────────────────────────────────────────────

    /// Mark a device for low-latency publication. Returns `false` if it
    /// was already tracked.
    pub fn add_tracked_device(&self, identity: impl Into<DeviceIdentity>) -> bool {
        let identity = identity.into();
        let added = self.inner.session.lock().tracked.insert(identity.clone());
        if added {
            debug!(device = %identity, "tracking device");
        }
        added
    }

    pub fn remove_tracked_device(&self, identity: &DeviceIdentity) -> bool {
        self.inner.session.lock().tracked.remove(identity)
    }

    pub fn tracked_devices(&self) -> Vec<DeviceIdentity> {
        let mut tracked: Vec<_> = self.inner.session.lock().tracked.iter().cloned().collect();
        tracked.sort();
        tracked
    }

    // ── Observables ──────────────────────────────────────────────────

    /// The coordinator's own discovery list, updated on every accepted event.
    pub fn devices(&self) -> DeviceStream {
        self.inner.discovered.subscribe()
    }

    pub fn devices_snapshot(&self) -> DeviceSnapshot {
        self.inner.discovered.snapshot()
    }

    /// Whether the discovery list holds this device.
    pub fn has_device(&self, identity: &DeviceIdentity) -> bool {
        self.inner.discovered.contains(identity)
    }

    pub fn hub(&self) -> &PublicationHub {
        &self.inner.hub
    }

    pub fn filter(&self) -> &Arc<FilterEngine> {
        &self.inner.filter
    }

    /// The refresh tier's list, re-emitted every refresh period while scanning.
    pub fn refresh_devices(&self) -> DeviceStream {
        self.inner.refresh.subscribe()
    }

    pub fn refresh_snapshot(&self) -> DeviceSnapshot {
        self.inner.refresh.snapshot()
    }

    pub fn scan_state(&self) -> watch::Receiver<ScanState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> ScanState {
        *self.inner.state.borrow()
    }

    pub fn is_scanning(&self) -> bool {
        self.state() == ScanState::Discovering
    }

    pub fn refresh_active(&self) -> bool {
        self.inner.refresh.is_active()
    }

    pub fn watch_refresh_active(&self) -> watch::Receiver<bool> {
        self.inner.refresh.watch_active()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.borrow().clone()
    }

    pub fn watch_last_error(&self) -> watch::Receiver<Option<String>> {
        self.inner.last_error.subscribe()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.inner.config
    }

    // ── Internals ────────────────────────────────────────────────────

    fn check_capabilities(&self) -> Result<(), CapabilityFault> {
        let radio = &self.inner.radio;
        if !radio.is_available() {
            return Err(CapabilityFault::RadioAbsent);
        }
        if !radio.is_enabled() {
            return Err(CapabilityFault::RadioDisabled);
        }
        if !radio.has_scan_authorization() {
            return Err(CapabilityFault::Unauthorized);
        }
        Ok(())
    }

    fn set_state(&self, state: ScanState) {
        self.inner.session.lock().state = state;
        self.inner.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    fn record_error(&self, err: &CoreError) {
        self.inner.last_error.send_replace(Some(err.to_string()));
    }

    /// Register the event channel and spawn the worker unless one is running.
    fn listen(&self, runtime: &Handle) {
        let mut slot = self.inner.listener.lock();
        if slot.is_none() {
            let (tx, rx) = mpsc::channel(self.inner.config.event_channel_size);
            let cancel = self.inner.cancel.child_token();
            let handle = runtime.spawn(event_worker(
                Arc::downgrade(&self.inner),
                rx,
                cancel.clone(),
            ));
            self.inner.radio.register_listener(tx);
            *slot = Some(ListenerTask {
                cancel,
                _handle: handle,
            });
            debug!(
                capacity = self.inner.config.event_channel_size,
                "event worker started"
            );
        }
        self.inner.listening.store(true, Ordering::Release);
    }

    fn unlisten(&self) {
        self.inner.listening.store(false, Ordering::Release);
        self.inner.radio.unregister_listener();
        if let Some(task) = self.inner.listener.lock().take() {
            task.cancel.cancel();
            debug!("event worker cancelled");
        }
    }

    fn handle_event(&self, event: RadioEvent) {
        if !self.inner.listening.load(Ordering::Acquire) {
            trace!("event arrived after cleanup, ignoring");
            return;
        }
        match event {
            RadioEvent::DeviceFound(found) => self.on_device_found(found),
            RadioEvent::DiscoveryFinished => self.on_cycle_finished(),
        }
    }

    fn on_device_found(&self, found: DiscoveryEvent) {
        let name = found.display_name.clone();
        let record = found.into_record();
        let identity = record.identity.clone();
        if !self.inner.filter.decide(name.as_deref(), identity.as_str()) {
            trace!(device = %identity, "device rejected by filter rules");
            return;
        }

        let now = Instant::now();

        if self.inner.discovered.upsert(record.clone()) {
            debug!(device = %identity, name = %record.display_name, "new device discovered");
        }
        self.inner.refresh.upsert(record.clone());
        let published = self.inner.hub.stage_and_maybe_publish_at(record, now);

        // A publish that already happened counts as the tracked flush.
        if self.tracked_flush_due(&identity, now) && !published {
            trace!(device = %identity, "tracked device forces publish");
            self.inner.hub.force_flush_at(now);
        }
    }

    fn tracked_flush_due(&self, identity: &DeviceIdentity, now: Instant) -> bool {
        let mut session = self.inner.session.lock();
        if !session.tracked.contains(identity) {
            return false;
        }
        let min = self.inner.config.tracked_min_interval;
        let due = session
            .last_tracked_flush
            .is_none_or(|last| now.saturating_duration_since(last) >= min);
        if due {
            session.last_tracked_flush = Some(now);
        }
        due
    }

    fn on_cycle_finished(&self) {
        let _lifecycle = self.inner.lifecycle.lock();
        self.inner.hub.force_flush();

        if !self.inner.continue_scanning.load(Ordering::Acquire) {
            self.set_state(ScanState::Idle);
            debug!("discovery cycle finished, not restarting");
            return;
        }

        match self.inner.radio.begin_discovery() {
            Ok(()) => debug!("discovery cycle restarted"),
            Err(e) => {
                self.inner.continue_scanning.store(false, Ordering::Release);
                self.inner.refresh.stop();
                self.set_state(ScanState::Idle);
                let err = CoreError::Restart {
                    message: e.to_string(),
                };
                warn!(error = %err, "continuous discovery disarmed");
                self.record_error(&err);
            }
        }
    }
}

// ── Event worker ─────────────────────────────────────────────────────

/// Drains the radio channel. Holds only a weak reference so a dropped
/// coordinator ends the worker.
async fn event_worker(
    inner: Weak<CoordinatorInner>,
    mut events: mpsc::Receiver<RadioEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                let Some(inner) = inner.upgrade() else { break };
                ScanCoordinator { inner }.handle_event(event);
            }
        }
    }
    debug!("event worker stopped");
}
