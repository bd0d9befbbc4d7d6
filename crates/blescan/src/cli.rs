//! Clap derive structures for the `blescan` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// blescan -- filtered, rate-limited nearby device discovery
#[derive(Debug, Parser)]
#[command(
    name = "blescan",
    version,
    about = "Discover nearby radio devices through filter rules",
    long_about = "Scans for nearby devices, filters them through allow/deny rules,\n\
        deduplicates by address and publishes the list at a bounded rate.\n\n\
        The bundled radio is a simulator configured in the [simulator] section.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "BLESCAN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Rule file (overrides `rules_path` from the config)
    #[arg(long, env = "BLESCAN_RULES", global = true)]
    pub rules: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "BLESCAN_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a discovery session and print the published device list
    #[command(alias = "s")]
    Scan(ScanArgs),

    /// Manage allow/deny filter rules
    #[command(alias = "r")]
    Rules(RulesArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SCAN
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// How long to scan (e.g. "10s", "2m")
    #[arg(long, short = 'd', default_value = "10s", value_parser = humantime::parse_duration)]
    pub duration: Duration,

    /// Track a device for low-latency publication (repeatable)
    #[arg(long = "track", short = 't', value_name = "ADDRESS")]
    pub track: Vec<String>,

    /// Also print every intermediate publish, not just the final list
    #[arg(long, short = 'w')]
    pub watch: bool,

    /// Only show devices at or above this signal strength (dBm)
    #[arg(long, allow_negative_numbers = true)]
    pub min_signal: Option<i16>,

    /// Only show devices that reported a name
    #[arg(long)]
    pub named: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RULES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// List all rules
    #[command(alias = "ls")]
    List,

    /// Add a rule
    Add(RuleAddArgs),

    /// Remove a rule by ID (or unique ID prefix, or alias)
    #[command(alias = "rm")]
    Remove {
        /// Rule ID, ID prefix or alias
        id: String,
    },

    /// Enable a rule
    Enable {
        /// Rule ID, ID prefix or alias
        id: String,
    },

    /// Disable a rule without deleting it
    Disable {
        /// Rule ID, ID prefix or alias
        id: String,
    },

    /// Check a name/address pair against the stored rules
    Test {
        /// Device address
        address: String,

        /// Device display name
        #[arg(long, short = 'n')]
        name: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct RuleAddArgs {
    /// Text to match (substring, or regex with --regex)
    #[arg(long, short = 'p')]
    pub pattern: String,

    /// Field the pattern is tested against
    #[arg(long, value_enum, default_value = "name")]
    pub target: TargetArg,

    /// Whether a match admits or excludes the device
    #[arg(long, value_enum, default_value = "allow")]
    pub kind: KindArg,

    /// Treat the pattern as a regular expression
    #[arg(long)]
    pub regex: bool,

    /// Short display label
    #[arg(long)]
    pub alias: Option<String>,

    /// Free-form note
    #[arg(long)]
    pub note: Option<String>,

    /// Store the rule disabled
    #[arg(long)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TargetArg {
    Name,
    Address,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Allow,
    Deny,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file populated with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display current resolved configuration
    Show,

    /// Set a configuration value
    Set {
        /// Config key (e.g. "scan.publish_interval_ms", "rules_path")
        key: String,

        /// Value to set
        value: String,
    },

    /// Print the config and rule file locations
    Path,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
