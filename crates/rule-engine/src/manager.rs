//! Rule lifecycle management
//!
//! The [`RuleManager`] is the CRUD surface over the engine: it assigns
//! UIDs, hands the engine its own copies of rules, and keeps the storage
//! collaborator in sync. Mutating operations are serialized.

use rule_core::{Rule, RuleStatusInfo};
use rule_storage::SharedRuleStorage;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::engine::SharedRuleEngine;
use crate::error::{EngineError, EngineResult};

/// Prefix of generated rule UIDs
pub const RULE_UID_PREFIX: &str = "rule_";

/// CRUD over rules, backed by the engine and a storage collaborator
pub struct RuleManager {
    engine: SharedRuleEngine,
    storage: SharedRuleStorage,
    /// Serializes add/update/remove/enable
    write_lock: Mutex<()>,
    next_id: AtomicU64,
}

impl RuleManager {
    pub fn new(engine: SharedRuleEngine, storage: SharedRuleStorage) -> Self {
        Self {
            engine,
            storage,
            write_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn engine(&self) -> &SharedRuleEngine {
        &self.engine
    }

    /// Register every persisted rule
    ///
    /// The UID counter is moved past the highest persisted `rule_N`.
    /// Returns the number of rules registered.
    pub async fn load(&self) -> EngineResult<usize> {
        let _guard = self.write_lock.lock().await;
        let stored = self.storage.all().await?;

        for rule in &stored {
            let Some(n) = rule.uid.as_deref().and_then(generated_number) else {
                continue;
            };
            match n.checked_add(1) {
                Some(next) => {
                    self.next_id.fetch_max(next, Ordering::SeqCst);
                }
                None => warn!(
                    rule_uid = %rule.uid_str(),
                    "Rule number out of range, not seeding UIDs"
                ),
            }
        }

        let mut loaded = 0;
        for rule in stored {
            let uid = rule.uid_str().to_string();
            match self.engine.register(rule) {
                Ok(_) => loaded += 1,
                Err(e) => warn!(rule_uid = %uid, error = %e, "Skipping persisted rule"),
            }
        }

        info!(count = loaded, "Loaded persisted rules");
        Ok(loaded)
    }

    /// Add a rule, assigning a `rule_N` UID when it has none
    #[instrument(skip(self, rule))]
    pub async fn add(&self, rule: &Rule, scope_identifier: Option<&str>) -> EngineResult<Rule> {
        let _guard = self.write_lock.lock().await;

        let mut rule = rule.clone();
        if let Some(scope) = scope_identifier {
            rule.scope_identifier = Some(scope.to_string());
        }
        match rule.uid.clone().filter(|uid| !uid.is_empty()) {
            Some(uid) if self.engine.contains(&uid) => return Err(EngineError::DuplicateRule(uid)),
            Some(_) => {}
            None => rule.uid = Some(self.generate_uid()),
        }

        let added = self.engine.register(rule)?;
        if let Err(e) = self.storage.put(&added).await {
            warn!(rule_uid = %added.uid_str(), error = %e, "Persisting rule failed, rolling back");
            self.engine.unregister(added.uid_str())?;
            return Err(e.into());
        }

        info!(rule_uid = %added.uid_str(), name = %added.display_name(), "Rule added");
        Ok(added)
    }

    /// Replace an existing rule; the engine re-binds it from scratch
    #[instrument(skip(self, rule))]
    pub async fn update(&self, rule: &Rule) -> EngineResult<Rule> {
        let _guard = self.write_lock.lock().await;

        let previous = rule.uid.as_deref().and_then(|uid| self.engine.get(uid));
        let updated = self.engine.update(rule.clone())?;
        if let Err(e) = self.storage.put(&updated).await {
            warn!(
                rule_uid = %updated.uid_str(),
                error = %e,
                "Persisting rule failed, rolling back"
            );
            if let Some(previous) = previous {
                self.engine.update(previous)?;
            }
            return Err(e.into());
        }

        debug!(rule_uid = %updated.uid_str(), "Rule updated");
        Ok(updated)
    }

    /// Returns whether a rule was removed
    #[instrument(skip(self))]
    pub async fn remove(&self, uid: &str) -> EngineResult<bool> {
        let _guard = self.write_lock.lock().await;

        match self.engine.unregister(uid) {
            Ok(removed) => {
                if let Err(e) = self.storage.remove(uid).await {
                    warn!(rule_uid = %uid, error = %e, "Deleting stored rule failed, rolling back");
                    self.engine.register(removed)?;
                    return Err(e.into());
                }
                Ok(true)
            }
            Err(EngineError::UnknownRule(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    pub async fn set_enabled(&self, uid: &str, enabled: bool) -> EngineResult<()> {
        let _guard = self.write_lock.lock().await;

        let previous = self
            .engine
            .get(uid)
            .ok_or_else(|| EngineError::UnknownRule(uid.to_string()))?;
        self.engine.set_enabled(uid, enabled)?;

        let Some(rule) = self.engine.get(uid) else {
            return Ok(());
        };
        if let Err(e) = self.storage.put(&rule).await {
            warn!(rule_uid = %uid, error = %e, "Persisting rule failed, rolling back");
            self.engine.set_enabled(uid, previous.enabled)?;
            return Err(e.into());
        }
        Ok(())
    }

    pub fn get(&self, uid: &str) -> Option<Rule> {
        self.engine.get(uid)
    }

    pub fn get_all(&self) -> Vec<Rule> {
        self.engine.rules()
    }

    pub fn get_by_tag(&self, tag: &str) -> Vec<Rule> {
        self.engine
            .rules()
            .into_iter()
            .filter(|rule| rule.tags.contains(tag))
            .collect()
    }

    pub fn get_status(&self, uid: &str) -> EngineResult<RuleStatusInfo> {
        self.engine.status(uid)
    }

    fn generate_uid(&self) -> String {
        loop {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            let uid = format!("{}{}", RULE_UID_PREFIX, n);
            if !self.engine.contains(&uid) {
                return uid;
            }
        }
    }
}

fn generated_number(uid: &str) -> Option<u64> {
    uid.strip_prefix(RULE_UID_PREFIX)?.parse().ok()
}
