//! Versioned JSON records, one file per rule

use async_trait::async_trait;
use rule_core::Rule;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{rule_uid, RuleStorage, StorageError, StorageResult};

/// Current major version of the rule record format
pub const RULE_VERSION: u32 = 1;

/// Current minor version of the rule record format
pub const RULE_MINOR_VERSION: u32 = 1;

const RECORD_SUFFIX: &str = ".json";
const TEMP_SUFFIX: &str = ".tmp";

/// Storage record wrapper with version tracking
///
/// JSON format:
/// ```json
/// {
///   "version": 1,
///   "minor_version": 1,
///   "key": "rule.rule_1",
///   "data": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageFile<T> {
    /// Major version - breaking changes
    pub version: u32,
    /// Minor version - compatible additions
    pub minor_version: u32,
    pub key: String,
    pub data: T,
}

impl<T> StorageFile<T> {
    pub fn new(key: impl Into<String>, data: T) -> Self {
        Self {
            version: RULE_VERSION,
            minor_version: RULE_MINOR_VERSION,
            key: key.into(),
            data,
        }
    }
}

/// Rule storage backed by a directory of JSON files
///
/// Each rule lives in `<dir>/<uid>.json`. Writes go to a temp file first and
/// are renamed into place.
#[derive(Debug)]
pub struct JsonRuleStorage {
    dir: PathBuf,
    /// Serializes writers so concurrent puts of one rule cannot share a temp file
    write_lock: Mutex<()>,
}

impl JsonRuleStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn ensure_dir(&self) -> StorageResult<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
            debug!(dir = ?self.dir, "Created rule storage directory");
        }
        Ok(())
    }

    fn file_path(&self, uid: &str) -> StorageResult<PathBuf> {
        let valid = !uid.is_empty()
            && uid != "."
            && uid != ".."
            && !uid.contains(['/', '\\'])
            && !uid.ends_with(TEMP_SUFFIX);
        if !valid {
            return Err(StorageError::InvalidKey(uid.to_string()));
        }
        Ok(self.dir.join(format!("{}{}", uid, RECORD_SUFFIX)))
    }

    async fn read_record(&self, path: &Path) -> StorageResult<Rule> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct VersionInfo {
            version: u32,
            minor_version: u32,
            key: String,
        }

        let info: VersionInfo = serde_json::from_str(&content)?;
        if info.version != RULE_VERSION {
            return Err(StorageError::MigrationRequired {
                key: info.key,
                from: info.version,
                to: RULE_VERSION,
            });
        }
        if info.minor_version < RULE_MINOR_VERSION {
            warn!(
                key = %info.key,
                found = info.minor_version,
                current = RULE_MINOR_VERSION,
                "Rule record has an older minor version"
            );
        }

        let record: StorageFile<Rule> = serde_json::from_str(&content)?;
        Ok(record.data)
    }
}

fn record_key(uid: &str) -> String {
    format!("rule.{}", uid)
}

#[async_trait]
impl RuleStorage for JsonRuleStorage {
    async fn get(&self, uid: &str) -> StorageResult<Option<Rule>> {
        let path = self.file_path(uid)?;
        if !path.exists() {
            return Ok(None);
        }
        self.read_record(&path).await.map(Some)
    }

    async fn put(&self, rule: &Rule) -> StorageResult<()> {
        let uid = rule_uid(rule)?;
        let path = self.file_path(uid)?;
        let temp_path = self.dir.join(format!("{}{}{}", uid, RECORD_SUFFIX, TEMP_SUFFIX));

        let content = serde_json::to_string_pretty(&StorageFile::new(record_key(uid), rule))?;

        let _guard = self.write_lock.lock().await;
        self.ensure_dir().await?;
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!(uid = %uid, "Saved rule record");
        Ok(())
    }

    async fn remove(&self, uid: &str) -> StorageResult<bool> {
        let path = self.file_path(uid)?;
        let _guard = self.write_lock.lock().await;

        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).await?;
        debug!(uid = %uid, "Deleted rule record");
        Ok(true)
    }

    async fn all(&self) -> StorageResult<Vec<Rule>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut rules = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            let is_record = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(RECORD_SUFFIX));
            if !is_file || !is_record {
                continue;
            }

            match self.read_record(&entry.path()).await {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    warn!(path = ?entry.path(), error = %e, "Skipping unreadable rule record");
                }
            }
        }

        debug!(count = rules.len(), "Loaded rule records");
        Ok(rules)
    }
}
