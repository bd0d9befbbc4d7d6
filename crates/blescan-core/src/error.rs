// ── Core error types ──
//
// Failures that change externally observable scan state, plus rule-store
// and configuration failures. Filter evaluation problems never appear
// here: they are logged and treated as a non-match.

use thiserror::Error;

/// Why the radio cannot be used right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityFault {
    RadioAbsent,
    RadioDisabled,
    Unauthorized,
}

impl std::fmt::Display for CapabilityFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::RadioAbsent => "no scanning radio is present",
            Self::RadioDisabled => "the scanning radio is disabled",
            Self::Unauthorized => "scanning is not authorized",
        };
        f.write_str(msg)
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Scan lifecycle errors ────────────────────────────────────────
    #[error("Cannot scan: {fault}")]
    Capability { fault: CapabilityFault },

    #[error("Radio rejected the request: {message}")]
    TransientStart { message: String },

    #[error("Continuous scanning stopped, restart failed: {message}")]
    Restart { message: String },

    // ── Rule storage errors ──────────────────────────────────────────
    #[error("Rule store error: {message}")]
    RuleStore { message: String },

    #[error("Rule not found: {id}")]
    RuleNotFound { id: String },

    #[error("Invalid rule pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the caller may reasonably retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStart { .. } | Self::Restart { .. })
    }
}

impl From<CapabilityFault> for CoreError {
    fn from(fault: CapabilityFault) -> Self {
        Self::Capability { fault }
    }
}
