use async_trait::async_trait;
use dashmap::DashMap;
use rule_core::Rule;

use crate::{rule_uid, RuleStorage, StorageResult};

/// Volatile storage, used when no storage directory is configured
#[derive(Debug, Default)]
pub struct MemoryRuleStorage {
    rules: DashMap<String, Rule>,
}

impl MemoryRuleStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[async_trait]
impl RuleStorage for MemoryRuleStorage {
    async fn get(&self, uid: &str) -> StorageResult<Option<Rule>> {
        Ok(self.rules.get(uid).map(|r| r.value().clone()))
    }

    async fn put(&self, rule: &Rule) -> StorageResult<()> {
        let uid = rule_uid(rule)?;
        self.rules.insert(uid.to_string(), rule.clone());
        Ok(())
    }

    async fn remove(&self, uid: &str) -> StorageResult<bool> {
        Ok(self.rules.remove(uid).is_some())
    }

    async fn all(&self) -> StorageResult<Vec<Rule>> {
        Ok(self.rules.iter().map(|r| r.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;
    use rule_core::Module;

    #[tokio::test]
    async fn test_put_get_remove() {
        let storage = MemoryRuleStorage::new();
        let rule = Rule::new(vec![Module::new("t", "core:EventTrigger")], vec![], vec![])
            .with_uid("rule_1");

        storage.put(&rule).await.unwrap();
        assert_eq!(storage.get("rule_1").await.unwrap(), Some(rule));
        assert_eq!(storage.all().await.unwrap().len(), 1);

        assert!(storage.remove("rule_1").await.unwrap());
        assert!(!storage.remove("rule_1").await.unwrap());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_put_requires_uid() {
        let storage = MemoryRuleStorage::new();
        let err = storage.put(&Rule::new(vec![], vec![], vec![])).await.unwrap_err();
        assert!(matches!(err, StorageError::MissingUid));
    }
}
