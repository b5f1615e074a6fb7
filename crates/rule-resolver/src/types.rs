//! Type-tag registry for compatibility checks
//!
//! Declared input/output types are free-form strings. Each known tag maps
//! to a small [`ValueKind`]; custom tags may name a parent tag they refine.
//! Compatibility is decided on tags and kinds only, never on live values.

use std::collections::HashMap;
use std::str::FromStr;
use tracing::trace;

/// Structural kind behind a declared type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Any,
    Text,
    Boolean,
    Integer,
    Decimal,
    Number,
    Object,
    List,
}

impl ValueKind {
    /// Whether a value of kind `source` may feed a target of this kind
    pub fn accepts(self, source: ValueKind) -> bool {
        use ValueKind::*;

        match (self, source) {
            (Any, _) => true,
            (Number, Integer | Decimal | Number) => true,
            (Decimal, Integer | Decimal) => true,
            (target, source) => target == source,
        }
    }
}

impl FromStr for ValueKind {
    type Err = ();

    /// Parse a kind name such as `integer` or `list`, ignoring case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(ValueKind::Any),
            "text" => Ok(ValueKind::Text),
            "boolean" => Ok(ValueKind::Boolean),
            "integer" => Ok(ValueKind::Integer),
            "decimal" => Ok(ValueKind::Decimal),
            "number" => Ok(ValueKind::Number),
            "object" => Ok(ValueKind::Object),
            "list" => Ok(ValueKind::List),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
struct TypeTag {
    kind: ValueKind,
    parent: Option<String>,
}

/// Registry of declared type tags
///
/// Tags are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    tags: HashMap<String, TypeTag>,
}

impl TypeRegistry {
    /// Create a registry with the built-in tags
    pub fn new() -> Self {
        let mut registry = Self {
            tags: HashMap::new(),
        };

        for (name, kind) in [
            ("any", ValueKind::Any),
            ("*", ValueKind::Any),
            ("text", ValueKind::Text),
            ("string", ValueKind::Text),
            ("boolean", ValueKind::Boolean),
            ("integer", ValueKind::Integer),
            ("decimal", ValueKind::Decimal),
            ("number", ValueKind::Number),
            ("object", ValueKind::Object),
            ("map", ValueKind::Object),
            ("list", ValueKind::List),
        ] {
            registry.register(name, kind, None);
        }
        registry
    }

    /// Register a tag, optionally refining a parent tag
    ///
    /// A tag with a parent is compatible with every ancestor tag.
    pub fn register(&mut self, name: &str, kind: ValueKind, parent: Option<&str>) {
        self.tags.insert(
            name.to_ascii_lowercase(),
            TypeTag {
                kind,
                parent: parent.map(str::to_ascii_lowercase),
            },
        );
    }

    /// Whether a value declared as `source` may feed a property declared as `target`
    ///
    /// Unknown tags are only compatible with themselves and with `any`.
    pub fn is_compatible(&self, source: &str, target: &str) -> bool {
        let source = source.to_ascii_lowercase();
        let target = target.to_ascii_lowercase();

        if source == target {
            return true;
        }

        let target_tag = match self.tags.get(&target) {
            Some(tag) => tag,
            None => {
                trace!(%source, %target, "Unknown target type tag");
                return false;
            }
        };
        if target_tag.kind == ValueKind::Any {
            return true;
        }

        // Walk the declared refinement chain first
        let mut current = self.tags.get(&source);
        let mut hops = 0;
        while let Some(tag) = current {
            match &tag.parent {
                Some(parent) if *parent == target => return true,
                Some(parent) if hops < self.tags.len() => {
                    current = self.tags.get(parent);
                    hops += 1;
                }
                _ => break,
            }
        }

        match self.tags.get(&source) {
            // Custom tags only match structurally through their parents
            Some(tag) if tag.parent.is_none() && target_tag.parent.is_none() => {
                target_tag.kind.accepts(tag.kind)
            }
            _ => false,
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
