// ── Domain model ──
//
// Canonical types shared by the filter engine, the cache/scheduler layer
// and the scan coordinator.

pub mod device;
pub mod identity;
pub mod rule;

// ── Re-exports ──────────────────────────────────────────────────────

pub use device::{DeviceRecord, PairingState, UNKNOWN_NAME};
pub use identity::DeviceIdentity;
pub use rule::{FilterRule, ListKind, MatchTarget};
