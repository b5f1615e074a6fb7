//! Condition comparing its input against a configured value

use async_trait::async_trait;
use regex::Regex;
use rule_core::{Module, Values};
use rule_handler_registry::{ConditionHandler, HandlerError, HandlerResult};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Matches,
}

impl FromStr for Operator {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" | "==" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "matches" => Ok(Operator::Matches),
            other => Err(HandlerError::Initialization(format!(
                "unknown operator '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Matches => "matches",
        };
        f.write_str(symbol)
    }
}

/// `input <operator> right`
///
/// Both sides compare as numbers when both parse as numbers, as strings
/// otherwise. `matches` tests the input against `right` as a regex.
pub struct CompareCondition {
    module_id: String,
    operator: Operator,
    right: String,
    pattern: Option<Regex>,
}

impl CompareCondition {
    pub fn from_module(module: &Module) -> HandlerResult<Self> {
        let operator: Operator = module
            .configuration
            .get("operator")
            .and_then(Value::as_str)
            .unwrap_or("=")
            .parse()?;
        let right = module
            .configuration
            .get("right")
            .map(value_to_string)
            .unwrap_or_default();

        let pattern = match operator {
            Operator::Matches => Some(Regex::new(&right).map_err(|e| {
                HandlerError::Initialization(format!("invalid regex '{}': {}", right, e))
            })?),
            _ => None,
        };

        Ok(Self {
            module_id: module.id.clone(),
            operator,
            right,
            pattern,
        })
    }

    fn compare(&self, left: &Value) -> bool {
        let left_text = value_to_string(left);

        if let Some(pattern) = &self.pattern {
            return pattern.is_match(&left_text);
        }

        let ordering = match (value_to_f64(left), self.right.trim().parse::<f64>().ok()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => Some(left_text.as_str().cmp(self.right.as_str())),
        };
        let Some(ordering) = ordering else {
            return false;
        };

        match self.operator {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Ne => ordering != Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
            Operator::Matches => false,
        }
    }
}

#[async_trait]
impl ConditionHandler for CompareCondition {
    async fn is_satisfied(&self, inputs: &Values) -> HandlerResult<bool> {
        let Some(left) = inputs.get("input") else {
            trace!(module = %self.module_id, "No input to compare");
            return Ok(false);
        };

        let satisfied = self.compare(left);
        trace!(
            module = %self.module_id,
            left = %left,
            operator = %self.operator,
            right = %self.right,
            satisfied,
            "Compared"
        );
        Ok(satisfied)
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => value.to_string(),
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(operator: &str, right: Value) -> CompareCondition {
        let module = Module::new("c", "core:CompareCondition")
            .with_config("operator", json!(operator))
            .with_config("right", right);
        CompareCondition::from_module(&module).unwrap()
    }

    fn input(value: Value) -> Values {
        Values::from([("input".to_string(), value)])
    }

    #[tokio::test]
    async fn test_numeric_comparison() {
        assert!(condition(">", json!("5")).is_satisfied(&input(json!(10))).await.unwrap());
        assert!(!condition(">", json!("50")).is_satisfied(&input(json!(10))).await.unwrap());
        assert!(condition("=", json!("10")).is_satisfied(&input(json!(10.0))).await.unwrap());
        assert!(condition("<=", json!(10)).is_satisfied(&input(json!("9.5"))).await.unwrap());
    }

    #[tokio::test]
    async fn test_numeric_not_lexicographic() {
        // "9" > "10" as strings, but not as numbers
        assert!(condition("<", json!("10")).is_satisfied(&input(json!(9))).await.unwrap());
    }

    #[tokio::test]
    async fn test_string_comparison() {
        assert!(condition("=", json!("on")).is_satisfied(&input(json!("on"))).await.unwrap());
        assert!(condition("!=", json!("on")).is_satisfied(&input(json!("off"))).await.unwrap());
        assert!(condition("<", json!("b")).is_satisfied(&input(json!("a"))).await.unwrap());
        assert!(condition("=", json!("true")).is_satisfied(&input(json!(true))).await.unwrap());
    }

    #[tokio::test]
    async fn test_matches() {
        let c = condition("matches", json!("^light\\.(hall|porch)$"));
        assert!(c.is_satisfied(&input(json!("light.hall"))).await.unwrap());
        assert!(!c.is_satisfied(&input(json!("light.kitchen"))).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_input_is_unsatisfied() {
        assert!(!condition("=", json!("x")).is_satisfied(&Values::new()).await.unwrap());
    }

    #[test]
    fn test_invalid_configuration() {
        let module = Module::new("c", "core:CompareCondition").with_config("operator", json!("~"));
        assert!(matches!(
            CompareCondition::from_module(&module),
            Err(HandlerError::Initialization(_))
        ));

        let module = Module::new("c", "core:CompareCondition")
            .with_config("operator", json!("matches"))
            .with_config("right", json!("(unclosed"));
        assert!(CompareCondition::from_module(&module).is_err());
    }

    #[test]
    fn test_default_operator_is_equality() {
        let module = Module::new("c", "core:CompareCondition").with_config("right", json!("on"));
        assert_eq!(CompareCondition::from_module(&module).unwrap().operator, Operator::Eq);
    }
}
