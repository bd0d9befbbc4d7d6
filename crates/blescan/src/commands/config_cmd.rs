//! Config command handlers.

use std::str::FromStr;

use serde::Serialize;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

const SETTABLE_KEYS: &str = "scan.publish_interval_ms, scan.tracked_min_interval_ms, \
    scan.refresh_period_ms, scan.event_channel_size, simulator.cycle_ms, \
    simulator.emit_every_ms, rules_path";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Paths {
    config: String,
    config_exists: bool,
    rules: String,
    rules_exists: bool,
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: key.into(),
        reason: format!("'{value}' is not a valid number"),
    })
}

fn apply_setting(cfg: &mut Config, key: &str, value: &str) -> Result<(), CliError> {
    match key {
        "scan.publish_interval_ms" => cfg.scan.publish_interval_ms = parse_number(key, value)?,
        "scan.tracked_min_interval_ms" => {
            cfg.scan.tracked_min_interval_ms = parse_number(key, value)?;
        }
        "scan.refresh_period_ms" => cfg.scan.refresh_period_ms = parse_number(key, value)?,
        "scan.event_channel_size" => cfg.scan.event_channel_size = parse_number(key, value)?,
        "simulator.cycle_ms" => cfg.simulator.cycle_ms = parse_number(key, value)?,
        "simulator.emit_every_ms" => cfg.simulator.emit_every_ms = parse_number(key, value)?,
        "rules_path" | "rules-path" => cfg.rules_path = Some(value.into()),
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!("unknown config key '{other}'. Valid keys: {SETTABLE_KEYS}"),
            });
        }
    }
    Ok(())
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_file(global);

    match args.command {
        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            config::save_config_to(&Config::default(), &path)?;
            if !global.quiet {
                eprintln!("✓ Wrote default configuration to {}", path.display());
            }
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let toml = config::to_toml(&cfg)?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |_| toml.trim_end().to_string(),
                |_| path.display().to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load(global)?;
            apply_setting(&mut cfg, &key, &value)?;
            cfg.to_scan_config()?;
            cfg.to_simulator_settings()?;
            config::save_config_to(&cfg, &path)?;
            if !global.quiet {
                eprintln!("✓ Set {key} in {}", path.display());
            }
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            let cfg = config::load(global)?;
            let rules = config::rules_path(global, &cfg);
            let paths = Paths {
                config: path.display().to_string(),
                config_exists: path.exists(),
                rules: rules.display().to_string(),
                rules_exists: rules.exists(),
            };
            let out = output::render_single(
                &global.output,
                &paths,
                |p| format!("config: {}\nrules:  {}", p.config, p.rules),
                |p| p.config.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
