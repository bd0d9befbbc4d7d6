//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use blescan_config::ConfigError;
use blescan_core::CoreError;

/// Process exit codes. Success exits with 0.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const RADIO: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFIG: i32 = 5;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Radio ────────────────────────────────────────────────────────
    #[error("Cannot scan: {reason}")]
    #[diagnostic(
        code(blescan::radio_unavailable),
        help(
            "Check that the radio is present, switched on, and that this\n\
             process is allowed to scan."
        )
    )]
    RadioUnavailable { reason: String },

    #[error("Radio error: {message}")]
    #[diagnostic(
        code(blescan::radio),
        help("The radio refused the request. Retrying usually succeeds.")
    )]
    Radio { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(blescan::not_found),
        help("Run: blescan {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("'{identifier}' matches more than one rule: {candidates}")]
    #[diagnostic(
        code(blescan::ambiguous),
        help("Use a longer ID prefix.")
    )]
    Ambiguous {
        identifier: String,
        candidates: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(blescan::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid configuration: {field} {reason}")]
    #[diagnostic(
        code(blescan::invalid_config),
        help("Fix the value in {path} or the matching BLESCAN_* variable.")
    )]
    InvalidConfig {
        field: String,
        reason: String,
        path: String,
    },

    #[error(transparent)]
    #[diagnostic(code(blescan::config))]
    Config(Box<figment::Error>),

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(blescan::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── Rule storage ─────────────────────────────────────────────────
    #[error("Rule store error: {message}")]
    #[diagnostic(
        code(blescan::rule_store),
        help("Check the rule file (see: blescan config path).")
    )]
    RuleStore { message: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(blescan::json))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(blescan::internal))]
    Internal(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RadioUnavailable { .. } | Self::Radio { .. } => exit_code::RADIO,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::Ambiguous { .. } => exit_code::USAGE,
            Self::InvalidConfig { .. } | Self::Config(_) | Self::ConfigExists { .. } => {
                exit_code::CONFIG
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Capability { fault } => CliError::RadioUnavailable {
                reason: fault.to_string(),
            },

            CoreError::TransientStart { message } | CoreError::Restart { message } => {
                CliError::Radio { message }
            }

            CoreError::RuleNotFound { id } => CliError::NotFound {
                resource_type: "rule".into(),
                identifier: id,
                list_command: "rules list".into(),
            },

            CoreError::InvalidPattern { pattern, reason } => CliError::Validation {
                field: "pattern".into(),
                reason: format!("'{pattern}': {reason}"),
            },

            CoreError::RuleStore { message } => CliError::RuleStore { message },

            CoreError::Io(e) => CliError::Io(e),

            CoreError::Serialization(e) => CliError::Json(e),

            CoreError::Config { message } => CliError::InvalidConfig {
                field: "scan".into(),
                reason: message,
                path: blescan_config::config_path().display().to_string(),
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::InvalidConfig {
                field,
                reason,
                path: blescan_config::config_path().display().to_string(),
            },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Serialization(e) => CliError::Internal(e.to_string()),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blescan_core::CapabilityFault;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let radio = CliError::from(CoreError::from(CapabilityFault::RadioDisabled));
        assert_eq!(radio.exit_code(), exit_code::RADIO);

        let missing = CliError::from(CoreError::RuleNotFound { id: "abc".into() });
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let pattern = CliError::from(CoreError::InvalidPattern {
            pattern: "(".into(),
            reason: "unclosed group".into(),
        });
        assert_eq!(pattern.exit_code(), exit_code::USAGE);

        let store = CliError::from(CoreError::RuleStore {
            message: "bad json".into(),
        });
        assert_eq!(store.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn config_validation_maps_to_config_exit_code() {
        let err = CliError::from(ConfigError::Validation {
            field: "scan.publish_interval_ms".into(),
            reason: "must be greater than zero".into(),
        });
        assert_eq!(err.exit_code(), exit_code::CONFIG);
    }
}
