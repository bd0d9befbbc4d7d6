//! Shared configuration for the blescan tools.
//!
//! TOML file + `BLESCAN_*` environment, merged with figment, and
//! translation to `blescan_core::ScanConfig` / `SimulatorSettings`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use blescan_core::{ScanConfig, SimulatedDevice, SimulatorSettings};

/// Environment variable prefix. Nested keys use `__`, e.g.
/// `BLESCAN_SCAN__PUBLISH_INTERVAL_MS=250`.
pub const ENV_PREFIX: &str = "BLESCAN_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Rule file location. Defaults to `rules.json` next to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<PathBuf>,

    /// Addresses that get low-latency publication.
    #[serde(default)]
    pub tracked: Vec<String>,

    #[serde(default)]
    pub scan: ScanSection,

    #[serde(default)]
    pub simulator: SimulatorSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScanSection {
    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u64,

    #[serde(default = "default_tracked_min_interval_ms")]
    pub tracked_min_interval_ms: u64,

    #[serde(default = "default_refresh_period_ms")]
    pub refresh_period_ms: u64,

    #[serde(default = "default_event_channel_size")]
    pub event_channel_size: usize,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            publish_interval_ms: default_publish_interval_ms(),
            tracked_min_interval_ms: default_tracked_min_interval_ms(),
            refresh_period_ms: default_refresh_period_ms(),
            event_channel_size: default_event_channel_size(),
        }
    }
}

fn default_publish_interval_ms() -> u64 {
    500
}
fn default_tracked_min_interval_ms() -> u64 {
    100
}
fn default_refresh_period_ms() -> u64 {
    1000
}
fn default_event_channel_size() -> usize {
    256
}

/// Settings for the built-in simulated radio.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulatorSection {
    #[serde(default = "default_cycle_ms")]
    pub cycle_ms: u64,

    #[serde(default = "default_emit_every_ms")]
    pub emit_every_ms: u64,

    #[serde(default = "default_devices")]
    pub devices: Vec<SimulatedDeviceEntry>,
}

impl Default for SimulatorSection {
    fn default() -> Self {
        Self {
            cycle_ms: default_cycle_ms(),
            emit_every_ms: default_emit_every_ms(),
            devices: default_devices(),
        }
    }
}

fn default_cycle_ms() -> u64 {
    4000
}
fn default_emit_every_ms() -> u64 {
    50
}

fn default_devices() -> Vec<SimulatedDeviceEntry> {
    [
        ("AA:BB:CC:DD:EE:01", Some("iPhone 12"), -58),
        ("AA:BB:CC:DD:EE:02", Some("Galaxy Buds"), -71),
        ("AA:BB:CC:DD:EE:03", None, -84),
        ("F0:0D:00:00:00:04", Some("Tile Tracker"), -66),
    ]
    .into_iter()
    .map(|(address, name, rssi)| SimulatedDeviceEntry {
        address: address.into(),
        name: name.map(Into::into),
        rssi,
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SimulatedDeviceEntry {
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default = "default_rssi")]
    pub rssi: i16,
}

fn default_rssi() -> i16 {
    -70
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Validate and convert the `[scan]` section.
    pub fn to_scan_config(&self) -> Result<ScanConfig, ConfigError> {
        let scan = &self.scan;
        if scan.publish_interval_ms == 0 {
            return Err(invalid("scan.publish_interval_ms", "must be greater than zero"));
        }
        if scan.tracked_min_interval_ms == 0 {
            return Err(invalid("scan.tracked_min_interval_ms", "must be greater than zero"));
        }
        if scan.tracked_min_interval_ms >= scan.publish_interval_ms {
            return Err(invalid(
                "scan.tracked_min_interval_ms",
                "must be shorter than scan.publish_interval_ms",
            ));
        }
        if scan.refresh_period_ms == 0 {
            return Err(invalid("scan.refresh_period_ms", "must be greater than zero"));
        }
        if scan.event_channel_size == 0 {
            return Err(invalid("scan.event_channel_size", "must be at least 1"));
        }

        Ok(ScanConfig {
            publish_interval: Duration::from_millis(scan.publish_interval_ms),
            tracked_min_interval: Duration::from_millis(scan.tracked_min_interval_ms),
            refresh_period: Duration::from_millis(scan.refresh_period_ms),
            event_channel_size: scan.event_channel_size,
        })
    }

    /// Validate and convert the `[simulator]` section.
    pub fn to_simulator_settings(&self) -> Result<SimulatorSettings, ConfigError> {
        let sim = &self.simulator;
        if sim.cycle_ms == 0 {
            return Err(invalid("simulator.cycle_ms", "must be greater than zero"));
        }
        if sim.emit_every_ms == 0 {
            return Err(invalid("simulator.emit_every_ms", "must be greater than zero"));
        }
        Ok(SimulatorSettings {
            cycle: Duration::from_millis(sim.cycle_ms),
            emit_every: Duration::from_millis(sim.emit_every_ms),
            devices: sim
                .devices
                .iter()
                .map(|d| SimulatedDevice::new(d.address.clone(), d.name.as_deref(), d.rssi))
                .collect(),
        })
    }

    /// Effective rule file location.
    pub fn rules_path(&self) -> PathBuf {
        self.rules_path.clone().unwrap_or_else(default_rules_path)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default rule file, beside the config file.
pub fn default_rules_path() -> PathBuf {
    config_dir().join("rules.json")
}

fn config_dir() -> PathBuf {
    ProjectDirs::from("com", "blescan", "blescan").map_or_else(dirs_fallback, |dirs| {
        dirs.config_dir().to_path_buf()
    })
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("blescan");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Layered sources: defaults, then the TOML file, then the environment.
pub fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields defaults + env.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(path).extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = to_toml(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

pub fn to_toml(cfg: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(cfg)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_translate_to_core_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.to_scan_config().unwrap(), ScanConfig::default());

        let sim = cfg.to_simulator_settings().unwrap();
        assert_eq!(sim.cycle, Duration::from_secs(4));
        assert_eq!(sim.emit_every, Duration::from_millis(50));
        assert_eq!(sim.devices.len(), 4);
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|jail| {
            let cfg = load_config_from(&jail.directory().join("absent.toml"))
                .map_err(|e| e.to_string())?;
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn toml_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                tracked = ["AA:BB:CC:DD:EE:01"]

                [scan]
                publish_interval_ms = 250

                [simulator]
                cycle_ms = 1000

                [[simulator.devices]]
                address = "11:22:33:44:55:66"
                name = "Beacon"
                "#,
            )?;
            let cfg = load_config_from(&jail.directory().join("config.toml"))
                .map_err(|e| e.to_string())?;
            assert_eq!(cfg.scan.publish_interval_ms, 250);
            assert_eq!(cfg.scan.tracked_min_interval_ms, 100);
            assert_eq!(cfg.tracked, vec!["AA:BB:CC:DD:EE:01".to_string()]);
            assert_eq!(cfg.simulator.cycle_ms, 1000);
            assert_eq!(cfg.simulator.emit_every_ms, 50);
            assert_eq!(cfg.simulator.devices.len(), 1);
            assert_eq!(cfg.simulator.devices[0].rssi, -70);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[scan]\npublish_interval_ms = 250\n")?;
            jail.set_env("BLESCAN_SCAN__PUBLISH_INTERVAL_MS", "800");
            jail.set_env("BLESCAN_RULES_PATH", "/tmp/custom-rules.json");

            let cfg = load_config_from(&jail.directory().join("config.toml"))
                .map_err(|e| e.to_string())?;
            assert_eq!(cfg.scan.publish_interval_ms, 800);
            assert_eq!(cfg.rules_path(), PathBuf::from("/tmp/custom-rules.json"));
            Ok(())
        });
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut cfg = Config::default();
        cfg.scan.publish_interval_ms = 0;
        let err = cfg.to_scan_config().unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "scan.publish_interval_ms")
        );
    }

    #[test]
    fn tracked_interval_must_be_shorter_than_publish() {
        let mut cfg = Config::default();
        cfg.scan.tracked_min_interval_ms = 500;
        assert!(cfg.to_scan_config().is_err());

        cfg.scan.tracked_min_interval_ms = 499;
        assert!(cfg.to_scan_config().is_ok());
    }

    #[test]
    fn zero_emit_period_is_rejected() {
        let mut cfg = Config::default();
        cfg.simulator.emit_every_ms = 0;
        assert!(cfg.to_simulator_settings().is_err());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.scan.refresh_period_ms = 2000;
        cfg.rules_path = Some(dir.path().join("rules.json"));
        save_config_to(&cfg, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("refresh_period_ms = 2000"));
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, cfg);
    }
}
