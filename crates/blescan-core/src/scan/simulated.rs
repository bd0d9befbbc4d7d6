// ── Simulated radio ──
//
// In-process `RadioScanner` used by the CLI and by tests. Each
// `begin_discovery` spawns one bounded burst that walks the configured
// devices round-robin, then reports `DiscoveryFinished`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::radio::{DiscoveryEvent, RadioError, RadioEvent, RadioScanner};

/// One device the simulator advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedDevice {
    pub address: String,
    pub name: Option<String>,
    /// Base signal strength; emissions jitter around it by up to ±4 dBm.
    pub rssi: i16,
    pub pairing_state: i32,
}

impl SimulatedDevice {
    pub fn new(address: impl Into<String>, name: Option<&str>, rssi: i16) -> Self {
        Self {
            address: address.into(),
            name: name.map(str::to_owned),
            rssi,
            pairing_state: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatorSettings {
    /// Length of one discovery burst.
    pub cycle: Duration,
    /// Delay between two emitted events within a burst.
    pub emit_every: Duration,
    pub devices: Vec<SimulatedDevice>,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            cycle: Duration::from_secs(4),
            emit_every: Duration::from_millis(50),
            devices: Vec::new(),
        }
    }
}

/// Configurable fake radio. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SimulatedRadio {
    inner: Arc<SimInner>,
}

struct SimInner {
    settings: SimulatorSettings,
    available: AtomicBool,
    enabled: AtomicBool,
    authorized: AtomicBool,
    reject_begin: AtomicBool,
    listener: Mutex<Option<mpsc::Sender<RadioEvent>>>,
    burst: Mutex<Option<CancellationToken>>,
    begin_calls: AtomicU64,
    cancel_calls: AtomicU64,
}

impl SimulatedRadio {
    pub fn new(settings: SimulatorSettings) -> Self {
        Self {
            inner: Arc::new(SimInner {
                settings,
                available: AtomicBool::new(true),
                enabled: AtomicBool::new(true),
                authorized: AtomicBool::new(true),
                reject_begin: AtomicBool::new(false),
                listener: Mutex::new(None),
                burst: Mutex::new(None),
                begin_calls: AtomicU64::new(0),
                cancel_calls: AtomicU64::new(0),
            }),
        }
    }

    /// A radio with no devices whose bursts never end on their own.
    /// Events are fed manually through [`inject`](Self::inject).
    pub fn manual() -> Self {
        Self::new(SimulatorSettings {
            cycle: Duration::MAX,
            ..SimulatorSettings::default()
        })
    }

    pub fn set_available(&self, value: bool) {
        self.inner.available.store(value, Ordering::Release);
    }

    pub fn set_enabled(&self, value: bool) {
        self.inner.enabled.store(value, Ordering::Release);
    }

    pub fn set_authorized(&self, value: bool) {
        self.inner.authorized.store(value, Ordering::Release);
    }

    /// Make subsequent `begin_discovery` calls fail.
    pub fn set_reject_begin(&self, value: bool) {
        self.inner.reject_begin.store(value, Ordering::Release);
    }

    pub fn is_discovering(&self) -> bool {
        self.inner.burst.lock().is_some()
    }

    pub fn has_listener(&self) -> bool {
        self.inner.listener.lock().is_some()
    }

    pub fn begin_calls(&self) -> u64 {
        self.inner.begin_calls.load(Ordering::Acquire)
    }

    pub fn cancel_calls(&self) -> u64 {
        self.inner.cancel_calls.load(Ordering::Acquire)
    }

    /// Deliver an event to the registered listener, as the platform would
    /// from its callback. Returns `false` if no listener took it.
    pub fn inject(&self, event: RadioEvent) -> bool {
        deliver(&self.inner, event)
    }

    /// End the running burst the way the platform does when its scan
    /// window elapses.
    pub fn finish_cycle(&self) -> bool {
        if let Some(token) = self.inner.burst.lock().take() {
            token.cancel();
        }
        deliver(&self.inner, RadioEvent::DiscoveryFinished)
    }
}

impl RadioScanner for SimulatedRadio {
    fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::Acquire)
    }

    fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    fn has_scan_authorization(&self) -> bool {
        self.inner.authorized.load(Ordering::Acquire)
    }

    fn begin_discovery(&self) -> Result<(), RadioError> {
        self.inner.begin_calls.fetch_add(1, Ordering::AcqRel);
        if self.inner.reject_begin.load(Ordering::Acquire) {
            return Err(RadioError::Rejected("simulated start failure".into()));
        }
        let runtime = Handle::try_current()
            .map_err(|_| RadioError::Unavailable("no async runtime for the simulator".into()))?;

        let token = CancellationToken::new();
        if let Some(previous) = self.inner.burst.lock().replace(token.clone()) {
            previous.cancel();
        }
        runtime.spawn(burst_task(Arc::clone(&self.inner), token));
        debug!(
            devices = self.inner.settings.devices.len(),
            "simulated discovery burst started"
        );
        Ok(())
    }

    fn cancel_discovery(&self) -> Result<(), RadioError> {
        self.inner.cancel_calls.fetch_add(1, Ordering::AcqRel);
        match self.inner.burst.lock().take() {
            Some(token) => {
                token.cancel();
                debug!("simulated discovery burst cancelled");
                Ok(())
            }
            None => Err(RadioError::NotRunning),
        }
    }

    fn register_listener(&self, sender: mpsc::Sender<RadioEvent>) {
        *self.inner.listener.lock() = Some(sender);
    }

    fn unregister_listener(&self) {
        self.inner.listener.lock().take();
    }
}

fn deliver(inner: &SimInner, event: RadioEvent) -> bool {
    let Some(sender) = inner.listener.lock().clone() else {
        return false;
    };
    match sender.try_send(event) {
        Ok(()) => true,
        Err(e) => {
            trace!(error = %e, "simulated radio dropped an event");
            false
        }
    }
}

/// Deterministic jitter in `-4..=4` dBm.
fn jitter(tick: usize, index: usize) -> i16 {
    let spread = tick.wrapping_mul(7).wrapping_add(index.wrapping_mul(3)) % 9;
    i16::try_from(spread).unwrap_or(0) - 4
}

fn next_event(settings: &SimulatorSettings, tick: usize) -> Option<DiscoveryEvent> {
    let index = tick % settings.devices.len().max(1);
    let device = settings.devices.get(index)?;
    Some(DiscoveryEvent {
        address: device.address.clone(),
        display_name: device.name.clone(),
        signal_strength: device.rssi.saturating_add(jitter(tick, index)),
        pairing_state: device.pairing_state,
    })
}

async fn burst_task(inner: Arc<SimInner>, token: CancellationToken) {
    let settings = &inner.settings;
    let deadline = tokio::time::Instant::now().checked_add(settings.cycle);
    let mut ticker = tokio::time::interval(settings.emit_every.max(Duration::from_millis(1)));
    let mut tick: usize = 0;

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => return,
            () = wait_until(deadline) => break,
            _ = ticker.tick() => {
                if let Some(event) = next_event(settings, tick) {
                    deliver(&inner, RadioEvent::DeviceFound(event));
                    tick += 1;
                }
            }
        }
    }

    // Replacing or cancelling a burst cancels its token under this lock,
    // so an uncancelled token here still owns the slot.
    {
        let mut slot = inner.burst.lock();
        if token.is_cancelled() {
            return;
        }
        slot.take();
    }
    deliver(&inner, RadioEvent::DiscoveryFinished);
    debug!(emitted = tick, "simulated discovery burst finished");
}

async fn wait_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
