// ── Filter rule domain types ──
//
// Rules are authored by an external rule-management surface and persisted
// by a `RuleStore`. The core only ever reads the enabled subset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Which device field a rule's pattern is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MatchTarget {
    Name,
    Address,
}

/// Whether a matching rule admits or rejects a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ListKind {
    Allow,
    Deny,
}

/// A single user-defined visibility rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    pub id: String,
    #[serde(default)]
    pub display_alias: String,
    pub pattern: String,
    pub match_target: MatchTarget,
    #[serde(default)]
    pub regex_enabled: bool,
    pub list_kind: ListKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl FilterRule {
    /// Build a new enabled plain-text rule with a fresh UUID.
    pub fn new(pattern: impl Into<String>, match_target: MatchTarget, list_kind: ListKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            display_alias: String::new(),
            pattern: pattern.into(),
            match_target,
            regex_enabled: false,
            list_kind,
            enabled: true,
            note: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn allow(pattern: impl Into<String>, match_target: MatchTarget) -> Self {
        Self::new(pattern, match_target, ListKind::Allow)
    }

    pub fn deny(pattern: impl Into<String>, match_target: MatchTarget) -> Self {
        Self::new(pattern, match_target, ListKind::Deny)
    }

    pub fn with_regex(mut self, regex_enabled: bool) -> Self {
        self.regex_enabled = regex_enabled;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.display_alias = alias.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Flip the enabled flag and bump `updated_at`.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.updated_at = Utc::now();
    }

    /// Alias if set, otherwise the raw pattern.
    pub fn label(&self) -> &str {
        if self.display_alias.is_empty() {
            &self.pattern
        } else {
            &self.display_alias
        }
    }
}
