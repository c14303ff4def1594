//! Watch rules: one implicit always-on rule plus a persisted, mutable list
//! of user-defined rules.

pub mod poller;

pub use poller::ChangeWatcher;

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::RegistryError;

/// A (property, value, notify-target) tuple the poller evaluates each cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchRule {
    pub id: Uuid,
    pub name: String,
    pub property: String,
    pub value: String,
    pub target: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Holds the implicit built-in rule and the persisted user rules.
///
/// Every mutation rewrites the full user-rule list to durable storage before
/// returning; on a persistence failure the in-memory change is rolled back
/// so memory and disk never diverge.
pub struct WatcherRegistry {
    builtin: WatchRule,
    rules: Vec<WatchRule>,
    path: PathBuf,
}

impl WatcherRegistry {
    /// The built-in rule's fixed id.
    pub const BUILTIN_RULE_ID: Uuid = Uuid::nil();

    /// Load persisted rules from `path`, a missing file meaning no user
    /// rules yet. The built-in rule is supplied by the caller and is never
    /// persisted.
    pub fn load(path: PathBuf, builtin: WatchRule) -> Result<Self, RegistryError> {
        let rules = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(RegistryError::Persistence {
                    path,
                    source: e,
                })
            }
        };
        info!(rules = rules.len(), path = %path.display(), "watch rules loaded");
        Ok(Self {
            builtin,
            rules,
            path,
        })
    }

    /// Load the registry from the configured rules file, with the built-in
    /// rule assembled from the configured defaults.
    pub fn from_config(config: &crate::config::TrackerConfig) -> Result<Self, RegistryError> {
        let builtin = Self::builtin_rule(
            "Captions ready",
            &config.default_watch_property,
            &config.default_watch_value,
            &config.default_notify_target,
        );
        Self::load(config.rules_path.clone(), builtin)
    }

    /// Convenience for building the implicit rule.
    pub fn builtin_rule(name: &str, property: &str, value: &str, target: &str) -> WatchRule {
        WatchRule {
            id: Self::BUILTIN_RULE_ID,
            name: name.to_string(),
            property: property.to_string(),
            value: value.to_string(),
            target: target.to_string(),
            enabled: true,
            created_at: Utc::now(),
        }
    }

    /// All rules, the built-in one first.
    pub fn list(&self) -> Vec<&WatchRule> {
        std::iter::once(&self.builtin).chain(self.rules.iter()).collect()
    }

    /// Enabled rules in evaluation order, cloned for use outside the lock.
    pub fn enabled_rules(&self) -> Vec<WatchRule> {
        self.list()
            .into_iter()
            .filter(|r| r.enabled)
            .cloned()
            .collect()
    }

    pub fn add(
        &mut self,
        name: &str,
        property: &str,
        value: &str,
        target: &str,
    ) -> Result<WatchRule, RegistryError> {
        let rule = WatchRule {
            id: Uuid::new_v4(),
            name: name.to_string(),
            property: property.to_string(),
            value: value.to_string(),
            target: target.to_string(),
            enabled: true,
            created_at: Utc::now(),
        };
        self.rules.push(rule.clone());
        if let Err(e) = self.persist() {
            self.rules.pop();
            return Err(e);
        }
        info!(rule_id = %rule.id, name, property, value, "watch rule added");
        Ok(rule)
    }

    pub fn enable(&mut self, id: Uuid) -> Result<(), RegistryError> {
        self.set_enabled(id, true)
    }

    pub fn disable(&mut self, id: Uuid) -> Result<(), RegistryError> {
        self.set_enabled(id, false)
    }

    fn set_enabled(&mut self, id: Uuid, enabled: bool) -> Result<(), RegistryError> {
        if id == self.builtin.id {
            return Err(RegistryError::BuiltinRule);
        }
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RegistryError::UnknownRule(id))?;
        let previous = rule.enabled;
        rule.enabled = enabled;
        if let Err(e) = self.persist() {
            if let Some(rule) = self.rules.iter_mut().find(|r| r.id == id) {
                rule.enabled = previous;
            }
            return Err(e);
        }
        info!(rule_id = %id, enabled, "watch rule toggled");
        Ok(())
    }

    pub fn delete(&mut self, id: Uuid) -> Result<(), RegistryError> {
        if id == self.builtin.id {
            return Err(RegistryError::BuiltinRule);
        }
        let index = self
            .rules
            .iter()
            .position(|r| r.id == id)
            .ok_or(RegistryError::UnknownRule(id))?;
        let removed = self.rules.remove(index);
        if let Err(e) = self.persist() {
            self.rules.insert(index, removed);
            return Err(e);
        }
        info!(rule_id = %id, "watch rule deleted");
        Ok(())
    }

    /// Rewrite the full user-rule list atomically: write to a temp file in
    /// the same directory, then rename over the target.
    fn persist(&self) -> Result<(), RegistryError> {
        let encoded = serde_json::to_vec_pretty(&self.rules)?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));

        let io_err = |source| RegistryError::Persistence {
            path: self.path.clone(),
            source,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(&io_err)?;
        tmp.write_all(&encoded).map_err(&io_err)?;
        tmp.persist(&self.path).map_err(|e| {
            warn!(path = %self.path.display(), "atomic rule rewrite failed");
            RegistryError::Persistence {
                path: self.path.clone(),
                source: e.error,
            }
        })?;
        Ok(())
    }
}
