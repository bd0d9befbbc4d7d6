// ── Scanning ──
//
// Radio port, the in-process simulator, and the coordinator that turns
// radio events into published device lists.

mod coordinator;
mod radio;
mod refresh;
mod simulated;

pub use coordinator::{ScanCoordinator, ScanState};
pub use radio::{DiscoveryEvent, RadioError, RadioEvent, RadioScanner};
pub use simulated::{SimulatedDevice, SimulatedRadio, SimulatorSettings};
