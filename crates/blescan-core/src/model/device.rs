// ── Device domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::identity::DeviceIdentity;

/// Display name used when the radio did not report one.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Bond state of a discovered device, normalized from the platform's
/// integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PairingState {
    None,
    Bonding,
    Bonded,
    Unknown,
}

impl PairingState {
    const BOND_NONE: i32 = 10;
    const BOND_BONDING: i32 = 11;
    const BOND_BONDED: i32 = 12;

    /// Map a raw platform bond-state code. Anything unrecognized is `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            Self::BOND_NONE => Self::None,
            Self::BOND_BONDING => Self::Bonding,
            Self::BOND_BONDED => Self::Bonded,
            _ => Self::Unknown,
        }
    }
}

/// Latest known attributes of one nearby device.
///
/// Records are never field-merged: every accepted discovery event for an
/// identity produces a complete new record that replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub identity: DeviceIdentity,
    pub display_name: String,
    /// Received signal strength in dBm.
    pub signal_strength: i16,
    pub pairing_state: PairingState,
    pub last_seen: DateTime<Utc>,
}

impl DeviceRecord {
    pub fn new(
        identity: DeviceIdentity,
        display_name: Option<String>,
        signal_strength: i16,
        pairing_state: PairingState,
    ) -> Self {
        let display_name = display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_owned());
        Self {
            identity,
            display_name,
            signal_strength,
            pairing_state,
            last_seen: Utc::now(),
        }
    }

    pub fn has_name(&self) -> bool {
        self.display_name != UNKNOWN_NAME
    }
}
