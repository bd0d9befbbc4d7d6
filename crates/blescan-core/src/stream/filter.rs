// ── View predicates for device snapshots ──
//
// Consumer-side narrowing of an already published list (e.g. a UI that
// hides weak signals). Unlike the rule engine, these never affect what
// is cached or published.

use std::sync::Arc;

use crate::model::{DeviceIdentity, DeviceRecord, PairingState};

/// Filter predicate for device snapshots.
pub enum DeviceFilter {
    All,
    /// Signal at or above the given dBm.
    MinSignal(i16),
    /// Only devices that reported a display name.
    Named,
    ByPairing(PairingState),
    ByIdentity(Vec<DeviceIdentity>),
    Custom(Box<dyn Fn(&DeviceRecord) -> bool + Send + Sync>),
}

impl DeviceFilter {
    pub fn matches(&self, device: &DeviceRecord) -> bool {
        match self {
            Self::All => true,
            Self::MinSignal(min) => device.signal_strength >= *min,
            Self::Named => device.has_name(),
            Self::ByPairing(state) => device.pairing_state == *state,
            Self::ByIdentity(ids) => ids.contains(&device.identity),
            Self::Custom(f) => f(device),
        }
    }

    /// Apply to a snapshot, preserving order.
    pub fn apply(&self, devices: &[Arc<DeviceRecord>]) -> Vec<Arc<DeviceRecord>> {
        devices
            .iter()
            .filter(|d| self.matches(d))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<Arc<DeviceRecord>> {
        vec![
            Arc::new(DeviceRecord::new("aa:01".into(), Some("Tag".into()), -40, PairingState::Bonded)),
            Arc::new(DeviceRecord::new("aa:02".into(), None, -85, PairingState::None)),
            Arc::new(DeviceRecord::new("aa:03".into(), Some("Watch".into()), -70, PairingState::None)),
        ]
    }

    #[test]
    fn min_signal_keeps_strong_devices() {
        let out = DeviceFilter::MinSignal(-70).apply(&devices());
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].identity.as_str(), "aa:03");
    }

    #[test]
    fn named_and_pairing_filters() {
        assert_eq!(DeviceFilter::Named.apply(&devices()).len(), 2);
        assert_eq!(
            DeviceFilter::ByPairing(PairingState::Bonded)
                .apply(&devices())
                .len(),
            1
        );
    }

    #[test]
    fn identity_and_custom_filters() {
        let by_id = DeviceFilter::ByIdentity(vec!["AA:02".into()]);
        assert_eq!(by_id.apply(&devices()).len(), 1);

        let custom = DeviceFilter::Custom(Box::new(|d| d.display_name.starts_with('W')));
        assert_eq!(custom.apply(&devices()).len(), 1);
        assert!(DeviceFilter::All.matches(&devices()[1]));
    }
}
