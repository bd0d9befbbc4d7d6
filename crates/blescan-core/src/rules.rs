// ── Rule storage ──
//
// Rule persistence is a dumb blob store: load/save of a rule list.
// The filter engine only consumes `load_enabled_rules()`; the rest of the
// surface exists for the rule-management front end.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::CoreError;
use crate::model::FilterRule;

/// Persistence contract for filter rules.
pub trait RuleStore: Send + Sync {
    /// All rules with `enabled == true`, in stored order.
    fn load_enabled_rules(&self) -> Result<Vec<FilterRule>, CoreError> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|r| r.enabled)
            .collect())
    }

    /// Insert a new rule or replace the one with the same id.
    fn upsert(&self, rule: FilterRule) -> Result<(), CoreError>;

    /// Delete a rule by id. Returns [`CoreError::RuleNotFound`] if absent.
    fn delete(&self, id: &str) -> Result<(), CoreError>;

    fn list_all(&self) -> Result<Vec<FilterRule>, CoreError>;
}

// ── In-memory store ─────────────────────────────────────────────────

/// Non-persistent store, keyed by rule id in insertion order.
#[derive(Default)]
pub struct MemoryRuleStore {
    rules: RwLock<IndexMap<String, FilterRule>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RuleStore for MemoryRuleStore {
    fn upsert(&self, rule: FilterRule) -> Result<(), CoreError> {
        self.rules.write().insert(rule.id.clone(), rule);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), CoreError> {
        self.rules
            .write()
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| CoreError::RuleNotFound { id: id.into() })
    }

    fn list_all(&self) -> Result<Vec<FilterRule>, CoreError> {
        Ok(self.rules.read().values().cloned().collect())
    }
}

// ── JSON file store ─────────────────────────────────────────────────

/// Rules persisted as a pretty-printed JSON array.
///
/// A missing file reads as an empty list. Every mutation rewrites the
/// whole file via a temporary sibling and a rename.
pub struct JsonRuleStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonRuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<FilterRule>, CoreError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&data).map_err(|e| CoreError::RuleStore {
            message: format!("{}: {e}", self.path.display()),
        })
    }

    fn write(&self, rules: &[FilterRule]) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(rules)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), count = rules.len(), "rules saved");
        Ok(())
    }
}

impl RuleStore for JsonRuleStore {
    fn upsert(&self, rule: FilterRule) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock();
        let mut rules = self.read()?;
        match rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => rules.push(rule),
        }
        self.write(&rules)
    }

    fn delete(&self, id: &str) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock();
        let mut rules = self.read()?;
        let before = rules.len();
        rules.retain(|r| r.id != id);
        if rules.len() == before {
            return Err(CoreError::RuleNotFound { id: id.into() });
        }
        self.write(&rules)
    }

    fn list_all(&self) -> Result<Vec<FilterRule>, CoreError> {
        self.read()
    }
}
