// ── Runtime scan configuration ──
//
// These types describe *how* a scan session is paced. They never touch
// disk: the CLI (via `blescan-config`) builds a `ScanConfig` and hands
// it in.

use std::time::Duration;

use crate::error::CoreError;

/// Pacing and buffering parameters for the publication pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Minimum time between two interval-driven publishes.
    pub publish_interval: Duration,
    /// Minimum time between two forced publishes caused by tracked devices.
    pub tracked_min_interval: Duration,
    /// Period of the refresh tier's re-emission.
    pub refresh_period: Duration,
    /// Capacity of the radio → coordinator event channel.
    pub event_channel_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            publish_interval: Duration::from_millis(500),
            tracked_min_interval: Duration::from_millis(100),
            refresh_period: Duration::from_secs(1),
            event_channel_size: 256,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.publish_interval.is_zero() {
            return Err(config_error("publish interval must be greater than zero"));
        }
        if self.tracked_min_interval.is_zero() {
            return Err(config_error("tracked interval must be greater than zero"));
        }
        if self.tracked_min_interval >= self.publish_interval {
            return Err(config_error(
                "tracked interval must be shorter than the publish interval",
            ));
        }
        if self.refresh_period.is_zero() {
            return Err(config_error("refresh period must be greater than zero"));
        }
        if self.event_channel_size == 0 {
            return Err(config_error("event channel size must be at least 1"));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> CoreError {
    CoreError::Config {
        message: message.into(),
    }
}
