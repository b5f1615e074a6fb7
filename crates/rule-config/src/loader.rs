//! YAML loading with include and environment tags
//!
//! Configuration files may use three tags:
//!
//! - `!include path` is replaced by the document at `path`
//! - `!include_dir_merge_list dir` concatenates the lists held by every
//!   `.yaml`/`.yml` file of `dir` in file name order; a file holding a single
//!   rule counts as a one-element list
//! - `!env_var NAME [default]` is replaced by the variable's value
//!
//! Relative paths resolve against the directory of the file using the tag.

use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::error::{ConfigError, ConfigResult};

/// Tags expanded by [`YamlLoader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigTag {
    Include,
    IncludeDirMergeList,
    EnvVar,
}

impl ConfigTag {
    const ALL: [ConfigTag; 3] = [
        ConfigTag::Include,
        ConfigTag::IncludeDirMergeList,
        ConfigTag::EnvVar,
    ];

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.name() == name)
    }

    fn name(self) -> &'static str {
        match self {
            ConfigTag::Include => "!include",
            ConfigTag::IncludeDirMergeList => "!include_dir_merge_list",
            ConfigTag::EnvVar => "!env_var",
        }
    }

    /// The scalar a tag applies to
    fn argument(self, value: &Value) -> ConfigResult<&str> {
        match value {
            Value::String(argument) if !argument.trim().is_empty() => Ok(argument.trim()),
            other if self == ConfigTag::EnvVar => Err(ConfigError::InvalidValue {
                key: self.name().to_string(),
                reason: format!("expected a variable name, got {:?}", other),
            }),
            other => Err(ConfigError::InvalidIncludePath {
                path: format!("{:?}", other),
                reason: "path must be a non-empty string".to_string(),
            }),
        }
    }
}

/// Expands configuration tags while loading YAML files
pub struct YamlLoader {
    /// Base of relative paths outside any file
    config_dir: PathBuf,
    /// Files being expanded, outermost first
    loading: Vec<PathBuf>,
}

impl YamlLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            loading: Vec::new(),
        }
    }

    /// Load `path` with every tag expanded
    ///
    /// A relative `path` resolves against the configuration directory.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.config_dir.join(path);
        if self.loading.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }
        debug!(path = %path.display(), depth = self.loading.len(), "Loading YAML file");

        let document = read_document(&path)?;
        self.loading.push(path);
        let expanded = self.expand(document);
        self.loading.pop();
        expanded
    }

    fn expand(&mut self, value: Value) -> ConfigResult<Value> {
        let expanded = match value {
            Value::Tagged(tagged) => self.expand_tagged(*tagged)?,
            Value::Mapping(mapping) => {
                let mut expanded = Mapping::with_capacity(mapping.len());
                for (key, value) in mapping {
                    expanded.insert(key, self.expand(value)?);
                }
                Value::Mapping(expanded)
            }
            Value::Sequence(items) => Value::Sequence(
                items
                    .into_iter()
                    .map(|item| self.expand(item))
                    .collect::<ConfigResult<_>>()?,
            ),
            scalar => scalar,
        };
        Ok(expanded)
    }

    fn expand_tagged(&mut self, tagged: TaggedValue) -> ConfigResult<Value> {
        let name = tagged.tag.to_string();
        trace!(tag = %name, "Expanding tag");

        let Some(tag) = ConfigTag::from_name(&name) else {
            // Foreign tags stay in place around their expanded content
            let value = self.expand(tagged.value)?;
            return Ok(Value::Tagged(Box::new(TaggedValue {
                tag: tagged.tag,
                value,
            })));
        };

        let argument = tag.argument(&tagged.value)?;
        match tag {
            ConfigTag::Include => {
                let file = self.relative_to_current(argument);
                self.load_file(file)
            }
            ConfigTag::IncludeDirMergeList => {
                let dir = self.relative_to_current(argument);
                self.merge_dir(&dir)
            }
            ConfigTag::EnvVar => env_var(argument),
        }
    }

    /// Concatenate the documents of every YAML file in `dir`
    fn merge_dir(&mut self, dir: &Path) -> ConfigResult<Value> {
        let mut merged = Vec::new();
        for file in yaml_files(dir)? {
            match self.load_file(&file)? {
                Value::Sequence(items) => merged.extend(items),
                Value::Null => {}
                single => merged.push(single),
            }
        }
        debug!(path = %dir.display(), entries = merged.len(), "Merged directory lists");
        Ok(Value::Sequence(merged))
    }

    fn relative_to_current(&self, path: &str) -> PathBuf {
        let base = self
            .loading
            .last()
            .and_then(|file| file.parent())
            .unwrap_or(&self.config_dir);
        base.join(path)
    }
}

fn read_document(path: &Path) -> ConfigResult<Value> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::ParseYaml {
        path: path.to_path_buf(),
        source,
    })
}

/// `.yaml` and `.yml` files directly inside `dir`, sorted by name
fn yaml_files(dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConfigError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    let read_error = |source| ConfigError::ReadFile {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        if matches!(path.extension().and_then(|ext| ext.to_str()), Some("yaml" | "yml")) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Value of `NAME`, or the default following it
fn env_var(argument: &str) -> ConfigResult<Value> {
    let (name, default) = match argument.split_once(char::is_whitespace) {
        Some((name, default)) => (name, Some(default.trim())),
        None => (argument, None),
    };

    if let Ok(value) = std::env::var(name) {
        debug!(var = %name, "Substituted environment variable");
        return Ok(Value::String(value));
    }
    match default {
        Some(default) => {
            debug!(var = %name, "Environment variable not set, using default");
            Ok(Value::String(default.to_string()))
        }
        None => Err(ConfigError::EnvVarNotFound {
            var: name.to_string(),
        }),
    }
}

/// Load a YAML file with full tag processing
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir).load_file(file)
}
