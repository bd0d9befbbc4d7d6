//! Shared helpers for command handlers.

use blescan_core::{FilterRule, RuleStore};

use crate::error::CliError;

/// Resolve a rule identifier (full ID, unique ID prefix, or alias).
pub fn resolve_rule(store: &dyn RuleStore, identifier: &str) -> Result<FilterRule, CliError> {
    let rules = store.list_all()?;

    if let Some(rule) = rules.iter().find(|r| r.id == identifier) {
        return Ok(rule.clone());
    }

    let mut candidates: Vec<&FilterRule> = rules
        .iter()
        .filter(|r| {
            r.id.starts_with(identifier)
                || (!r.display_alias.is_empty() && r.display_alias == identifier)
        })
        .collect();

    match candidates.len() {
        0 => Err(CliError::NotFound {
            resource_type: "rule".into(),
            identifier: identifier.into(),
            list_command: "rules list".into(),
        }),
        1 => Ok(candidates.remove(0).clone()),
        _ => Err(CliError::Ambiguous {
            identifier: identifier.into(),
            candidates: candidates
                .iter()
                .map(|r| short_id(&r.id))
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// First eight characters of a rule ID, for tables.
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}
