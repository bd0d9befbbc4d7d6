// ── Visibility filter engine ──
//
// Decides whether a discovered device is admitted into the pipeline.
// Rules are compiled once into a `RuleSet` (lowercased needles,
// pre-built regexes) and swapped in atomically, so `decide()` never
// blocks, allocates a regex, or touches storage.

use std::sync::Arc;

use arc_swap::ArcSwap;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{DeviceIdentity, FilterRule, ListKind, MatchTarget};
use crate::rules::RuleStore;

/// Upper bound on compiled regex program size. Patterns beyond it fail to
/// compile and are treated as never matching.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// How a single compiled rule tests its target field.
#[derive(Debug)]
enum Matcher {
    /// Case-insensitive substring containment; the needle is pre-lowercased.
    Contains(String),
    /// Unanchored regex search.
    Regex(Regex),
    /// Pattern failed to compile.
    Never,
}

#[derive(Debug)]
struct CompiledRule {
    id: String,
    target: MatchTarget,
    matcher: Matcher,
}

fn build_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
}

/// Check a rule before it is stored. Evaluation tolerates bad patterns;
/// this lets editors reject them up front.
pub fn validate_rule(rule: &FilterRule) -> Result<(), CoreError> {
    if rule.pattern.trim().is_empty() {
        return Err(CoreError::InvalidPattern {
            pattern: rule.pattern.clone(),
            reason: "pattern must not be empty".into(),
        });
    }
    if rule.regex_enabled {
        build_regex(&rule.pattern, false).map_err(|e| CoreError::InvalidPattern {
            pattern: rule.pattern.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

impl CompiledRule {
    /// Address rules are matched against the normalized identity form, so
    /// plain address needles are normalized the same way and address
    /// regexes ignore case.
    fn compile(rule: &FilterRule) -> Self {
        let on_address = rule.match_target == MatchTarget::Address;
        let matcher = if rule.regex_enabled {
            match build_regex(&rule.pattern, on_address) {
                Ok(re) => Matcher::Regex(re),
                Err(e) => {
                    warn!(rule_id = %rule.id, pattern = %rule.pattern, error = %e,
                        "invalid rule pattern, rule will never match");
                    Matcher::Never
                }
            }
        } else if on_address {
            Matcher::Contains(DeviceIdentity::new(&rule.pattern).as_str().to_owned())
        } else {
            Matcher::Contains(rule.pattern.to_lowercase())
        };

        Self {
            id: rule.id.clone(),
            target: rule.match_target,
            matcher,
        }
    }

    /// Test the rule against its own target field only.
    fn matches(&self, name: &str, address: &str) -> bool {
        let field = match self.target {
            MatchTarget::Name => name,
            MatchTarget::Address => address,
        };
        match &self.matcher {
            Matcher::Contains(needle) => field.to_lowercase().contains(needle.as_str()),
            Matcher::Regex(re) => re.is_match(field),
            Matcher::Never => false,
        }
    }
}

/// The enabled subset of the user's rules, partitioned and compiled.
#[derive(Debug, Default)]
pub struct RuleSet {
    allow: Vec<CompiledRule>,
    deny: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile the enabled rules. Disabled rules are dropped here and are
    /// therefore inert.
    pub fn compile<'a>(rules: impl IntoIterator<Item = &'a FilterRule>) -> Self {
        let mut set = Self::default();
        for rule in rules.into_iter().filter(|r| r.enabled) {
            let compiled = CompiledRule::compile(rule);
            match rule.list_kind {
                ListKind::Allow => set.allow.push(compiled),
                ListKind::Deny => set.deny.push(compiled),
            }
        }
        set
    }

    pub fn len(&self) -> usize {
        self.allow.len() + self.deny.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }

    /// Evaluate a candidate. An absent name is matched as the empty string;
    /// the address is normalized to its identity form first.
    pub fn decide(&self, name: Option<&str>, address: &str) -> bool {
        if self.is_empty() {
            return true;
        }
        let name = name.unwrap_or_default();
        let identity = DeviceIdentity::new(address);
        let address = identity.as_str();

        if !self.allow.is_empty() && !self.allow.iter().any(|r| r.matches(name, address)) {
            return false;
        }

        if let Some(rule) = self.deny.iter().find(|r| r.matches(name, address)) {
            debug!(rule_id = %rule.id, address, "device denied by rule");
            return false;
        }

        true
    }
}

/// Thread-safe, lock-free holder of the active `RuleSet`.
pub struct FilterEngine {
    rules: ArcSwap<RuleSet>,
}

impl FilterEngine {
    /// An engine with no rules: everything is allowed.
    pub fn new() -> Self {
        Self {
            rules: ArcSwap::from_pointee(RuleSet::empty()),
        }
    }

    pub fn with_rules(rules: &[FilterRule]) -> Self {
        Self {
            rules: ArcSwap::from_pointee(RuleSet::compile(rules)),
        }
    }

    /// Replace the active rule set. Takes effect for the next `decide()`.
    pub fn replace_rules(&self, rules: &[FilterRule]) {
        let set = RuleSet::compile(rules);
        debug!(enabled = set.len(), "filter rules replaced");
        self.rules.store(Arc::new(set));
    }

    /// Load the enabled rules from a store and swap them in.
    ///
    /// On a store failure the previous rule set stays active.
    pub fn reload(&self, store: &dyn RuleStore) -> Result<usize, CoreError> {
        let rules = store.load_enabled_rules()?;
        self.replace_rules(&rules);
        Ok(self.rule_count())
    }

    /// Whether a device with this name and address should be shown.
    pub fn decide(&self, name: Option<&str>, address: &str) -> bool {
        self.rules.load().decide(name, address)
    }

    /// Number of enabled rules in the active set.
    pub fn rule_count(&self) -> usize {
        self.rules.load().len()
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new()
    }
}
