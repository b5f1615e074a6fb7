//! Module type descriptors and rule templates
//!
//! Module types are served read-only by a [`ModuleTypeCatalog`](crate::ModuleTypeCatalog).
//! They declare the inputs, outputs and configuration parameters of every
//! module instantiated from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::module::{Configuration, Module, ModuleKind};

/// Declared type of a configuration parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigType {
    #[default]
    Text,
    Boolean,
    Integer,
    Decimal,
}

impl ConfigType {
    /// Convert a literal default to this type
    ///
    /// `BOOLEAN` accepts case-insensitive `true`/`false`; anything that does
    /// not parse resolves to `None`.
    pub fn convert(self, literal: &str) -> Option<Value> {
        match self {
            ConfigType::Text => Some(Value::String(literal.to_string())),
            ConfigType::Boolean => {
                if literal.eq_ignore_ascii_case("true") {
                    Some(Value::Bool(true))
                } else if literal.eq_ignore_ascii_case("false") {
                    Some(Value::Bool(false))
                } else {
                    None
                }
            }
            ConfigType::Integer => literal.trim().parse::<i64>().ok().map(Value::from),
            ConfigType::Decimal => literal
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
        }
    }
}

/// A configuration parameter declared by a module type or template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDescriptor {
    pub name: String,

    #[serde(rename = "type", default)]
    pub config_type: ConfigType,

    /// Literal default, or a `$name` reference to another parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// `$name` reference to the parameter this one takes its value from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigDescriptor {
    pub fn new(name: impl Into<String>, config_type: ConfigType) -> Self {
        Self {
            name: name.into(),
            config_type,
            default: None,
            context: None,
            required: false,
            description: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A named input declared by a condition or action type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub name: String,

    /// Declared value type tag, e.g. `integer` or `any`
    #[serde(rename = "type")]
    pub value_type: String,

    /// `$name` reference to another input this one mirrors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl Input {
    pub fn new(name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: value_type.into(),
            reference: None,
            default_value: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// A named output declared by a trigger or action type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,

    #[serde(rename = "type")]
    pub value_type: String,

    /// `$name` reference to the output this one takes its value from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Output {
    pub fn new(name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: value_type.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Declarations of one module type
///
/// A custom type `System:Custom` extends `System`; the effective descriptor
/// set is the union across the ancestor chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleType {
    pub uid: String,

    pub kind: ModuleKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub config_descriptions: Vec<ConfigDescriptor>,

    #[serde(default)]
    pub inputs: Vec<Input>,

    #[serde(default)]
    pub outputs: Vec<Output>,
}

impl ModuleType {
    pub fn new(uid: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            uid: uid.into(),
            kind,
            label: None,
            description: None,
            config_descriptions: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_config(mut self, descriptor: ConfigDescriptor) -> Self {
        self.config_descriptions.push(descriptor);
        self
    }

    pub fn with_input(mut self, input: Input) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }
}

/// A reusable rule skeleton instantiated with a rule's configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTemplate {
    pub uid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub config_descriptions: Vec<ConfigDescriptor>,

    #[serde(default)]
    pub triggers: Vec<Module>,

    #[serde(default)]
    pub conditions: Vec<Module>,

    #[serde(default)]
    pub actions: Vec<Module>,

    /// Default configuration values merged under the rule's own
    #[serde(default)]
    pub configuration: Configuration,
}
