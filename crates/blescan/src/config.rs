//! CLI configuration: thin wrapper around `blescan_config` shared types.
//!
//! Adds resolution that respects the `--config` and `--rules` overrides.

use std::path::PathBuf;

use blescan_core::JsonRuleStore;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use blescan_config::{Config, config_path, load_config_from, save_config_to, to_toml};

// ── CLI-specific helpers ────────────────────────────────────────────

/// The config file in effect (flag/env > platform default).
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load the layered config for this invocation.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config_from(&config_file(global))?)
}

/// The rule file in effect (flag/env > `rules_path` > `rules.json` beside
/// the config file in effect).
pub fn rules_path(global: &GlobalOpts, config: &Config) -> PathBuf {
    global
        .rules
        .clone()
        .or_else(|| config.rules_path.clone())
        .unwrap_or_else(|| config_file(global).with_file_name("rules.json"))
}

pub fn rule_store(global: &GlobalOpts, config: &Config) -> JsonRuleStore {
    JsonRuleStore::new(rules_path(global, config))
}
