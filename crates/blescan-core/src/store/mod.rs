// ── Device storage and publication ──
//
// Ordered per-identity cache, an observable wrapper around it, and the
// debounced scheduler that decides when staged records become visible.

mod cache;
pub(crate) mod collection;
mod scheduler;

pub use cache::{DeviceCache, DeviceSnapshot};
pub use scheduler::PublishScheduler;
