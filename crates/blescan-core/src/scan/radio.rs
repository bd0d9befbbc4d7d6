// ── Radio scanning primitive ──
//
// The platform radio is an external collaborator. It answers capability
// queries, accepts begin/cancel commands, and delivers events into a
// bounded channel registered by the coordinator.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::model::{DeviceIdentity, DeviceRecord, PairingState};

/// Failures reported by the radio primitive.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RadioError {
    /// Cancel was requested while no discovery was running.
    #[error("discovery is not running")]
    NotRunning,

    #[error("radio rejected the command: {0}")]
    Rejected(String),

    #[error("radio unavailable: {0}")]
    Unavailable(String),
}

/// One raw observation of a nearby device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEvent {
    pub address: String,
    pub display_name: Option<String>,
    /// Signal strength in dBm.
    pub signal_strength: i16,
    /// Platform bond-state code (see [`PairingState::from_code`]).
    pub pairing_state: i32,
}

impl DiscoveryEvent {
    pub fn new(address: impl Into<String>, display_name: Option<&str>, signal_strength: i16) -> Self {
        Self {
            address: address.into(),
            display_name: display_name.map(str::to_owned),
            signal_strength,
            pairing_state: 10,
        }
    }

    pub fn into_record(self) -> DeviceRecord {
        DeviceRecord::new(
            DeviceIdentity::new(&self.address),
            self.display_name,
            self.signal_strength,
            PairingState::from_code(self.pairing_state),
        )
    }
}

/// Everything a radio can deliver to its listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    DeviceFound(DiscoveryEvent),
    /// The current bounded discovery burst ended.
    DiscoveryFinished,
}

/// Port that abstracts the platform's nearby-device scanning backend.
///
/// Implementations deliver events with `try_send` so that a slow consumer
/// never blocks the radio's callback context; a full channel drops events.
pub trait RadioScanner: Send + Sync {
    fn is_available(&self) -> bool;

    fn is_enabled(&self) -> bool;

    fn has_scan_authorization(&self) -> bool;

    /// Start one bounded discovery burst.
    fn begin_discovery(&self) -> Result<(), RadioError>;

    /// Stop the running burst. Returns [`RadioError::NotRunning`] when idle.
    fn cancel_discovery(&self) -> Result<(), RadioError>;

    /// Route subsequent events into `sender`, replacing any previous listener.
    fn register_listener(&self, sender: mpsc::Sender<RadioEvent>);

    fn unregister_listener(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_converts_to_normalized_record() {
        let mut event = DiscoveryEvent::new("AA-BB-CC-DD-EE-FF", None, -71);
        event.pairing_state = 12;
        let rec = event.into_record();
        assert_eq!(rec.identity.as_str(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(rec.display_name, crate::model::UNKNOWN_NAME);
        assert_eq!(rec.pairing_state, PairingState::Bonded);
        assert_eq!(rec.signal_strength, -71);
    }
}
