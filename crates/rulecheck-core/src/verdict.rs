//! The structured outcome of one evaluation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::extract::{extract_json_blocks, ParseError};

/// How many rules the grading model found broken, and which.
///
/// `violation_count` is copied from the model's own answer. It is never
/// recomputed from `violations` and the two may disagree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    pub violation_count: u64,
    pub violations: Vec<String>,
}

impl EvaluationVerdict {
    pub fn new(violation_count: u64, violations: Vec<String>) -> Self {
        Self {
            violation_count,
            violations,
        }
    }

    /// Build a verdict from a raw model response.
    pub fn from_response(text: &str) -> Result<Self, ParseError> {
        let blocks = extract_json_blocks(text)?;
        Self::from_blocks(&blocks)
    }

    /// Build a verdict from extracted blocks; only the first block is read.
    ///
    /// No block, or an empty/falsy first block, yields the default verdict.
    /// Missing or `null` fields fall back to `0` and `[]`.
    pub fn from_blocks(blocks: &[Value]) -> Result<Self, ParseError> {
        let Some(first) = blocks.first().filter(|value| !is_falsy(value)) else {
            return Ok(Self::default());
        };

        let Value::Object(object) = first else {
            return Err(ParseError::UnexpectedShape {
                found: describe(first),
            });
        };

        Ok(Self {
            violation_count: read_count(object)?,
            violations: read_violations(object)?,
        })
    }

    /// Whether the model reported anything at all.
    pub fn has_violations(&self) -> bool {
        self.violation_count > 0 || !self.violations.is_empty()
    }

    /// Whether the reported count matches the number of listed violations.
    pub fn is_consistent(&self) -> bool {
        usize::try_from(self.violation_count).is_ok_and(|count| count == self.violations.len())
    }
}

/// Emptiness in the loose sense a model's "nothing to report" takes.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

fn describe(value: &Value) -> String {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    format!("{} ({})", kind, value)
}

fn read_count(object: &Map<String, Value>) -> Result<u64, ParseError> {
    let value = match object.get("violation_count") {
        None | Some(Value::Null) => return Ok(0),
        Some(value) => value,
    };

    let count = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    });

    count.ok_or_else(|| ParseError::InvalidField {
        field: "violation_count",
        value: value.to_string(),
    })
}

fn read_violations(object: &Map<String, Value>) -> Result<Vec<String>, ParseError> {
    match object.get("violations") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()),
        Some(other) => Err(ParseError::InvalidField {
            field: "violations",
            value: other.to_string(),
        }),
    }
}
