//! Discovery pipeline for nearby radio devices.
//!
//! This crate owns the filtering, deduplication and rate-limited
//! publication of device sightings:
//!
//! - **[`ScanCoordinator`]**: Drives a [`RadioScanner`] through repeated
//!   discovery cycles. Radio events arrive on a bounded channel drained by
//!   a single worker; accepted devices feed the coordinator's own list, the
//!   shared [`PublicationHub`], and a periodically re-emitting refresh tier.
//!   Tracked devices bypass the publish interval.
//!
//! - **[`FilterEngine`]**: Allow/deny rules matched on display name or
//!   address, plain substring or regex. Rules are compiled once and swapped
//!   atomically; a failing pattern never matches and never aborts a decision.
//!
//! - **[`PublicationHub`]**: The one debounced, deduplicated device list
//!   shared by every coordinator, vended by [`HubProvider`]. Consumers read
//!   it as an immutable snapshot or subscribe through [`DeviceStream`].
//!
//! - **[`RuleStore`]**: Persistence port for filter rules, with in-memory
//!   and JSON-file implementations.

pub mod config;
pub mod error;
pub mod filter;
pub mod hub;
pub mod model;
pub mod rules;
pub mod scan;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::ScanConfig;
pub use error::{CapabilityFault, CoreError};
pub use filter::{FilterEngine, RuleSet, validate_rule};
pub use hub::{HubProvider, HubStats, PublicationHub};
pub use rules::{JsonRuleStore, MemoryRuleStore, RuleStore};
pub use scan::{
    DiscoveryEvent, RadioError, RadioEvent, RadioScanner, ScanCoordinator, ScanState,
    SimulatedDevice, SimulatedRadio, SimulatorSettings,
};
pub use store::{DeviceCache, DeviceSnapshot, PublishScheduler};
pub use stream::{DeviceFilter, DeviceStream};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    DeviceIdentity, DeviceRecord, FilterRule, ListKind, MatchTarget, PairingState, UNKNOWN_NAME,
};
