//! Per-record schema validation and type coercion

use super::{FeatureSchema, FieldKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Field name used for errors that concern the record as a whole
pub const ROOT_FIELD: &str = "__root__";

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// A normalized field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Category(String),
    Missing,
}

/// A validated record: every schema feature present, in schema order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Outcome of validating one raw record
pub type ValidationOutcome = std::result::Result<Record, Vec<FieldError>>;

/// Checks raw JSON records against a [`FeatureSchema`]
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    schema: Arc<FeatureSchema>,
}

impl SchemaValidator {
    pub fn new(schema: Arc<FeatureSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Validate a single raw record.
    ///
    /// Numeric fields accept JSON numbers and numeric strings; categorical fields
    /// accept strings, and numbers or booleans in their text form. Null or absent
    /// is always valid. Unknown fields are dropped.
    pub fn validate(&self, raw: &Value) -> ValidationOutcome {
        let object = match raw {
            Value::Object(map) => map,
            other => {
                return Err(vec![FieldError::new(
                    ROOT_FIELD,
                    format!("expected object, got {}", json_type_name(other)),
                )])
            }
        };

        let mut fields = Vec::with_capacity(self.schema.n_features());
        let mut errors = Vec::new();

        for (name, kind) in self.schema.fields() {
            let coerced = match object.get(name) {
                None | Some(Value::Null) => Ok(FieldValue::Missing),
                Some(value) => coerce(value, kind),
            };
            match coerced {
                Ok(value) => fields.push((name.to_string(), value)),
                Err(reason) => errors.push(FieldError::new(name, reason)),
            }
        }

        if errors.is_empty() {
            Ok(Record { fields })
        } else {
            Err(errors)
        }
    }

    /// Validate every record independently; one bad record never affects another
    pub fn validate_batch(&self, raws: &[Value]) -> Vec<ValidationOutcome> {
        raws.iter().map(|raw| self.validate(raw)).collect()
    }
}

fn coerce(value: &Value, kind: FieldKind) -> std::result::Result<FieldValue, String> {
    match (kind, value) {
        (FieldKind::Numeric, Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .map(FieldValue::Number)
            .ok_or_else(|| format!("number {} is out of range", n)),
        (FieldKind::Numeric, Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(FieldValue::Number(v)),
            _ => Err("expected numeric, got string".to_string()),
        },
        (FieldKind::Numeric, other) => Err(format!("expected numeric, got {}", json_type_name(other))),
        (FieldKind::Categorical, Value::String(s)) => Ok(FieldValue::Category(s.clone())),
        // same text polars produces when a numeric or boolean column is cast to String at fit
        (FieldKind::Categorical, Value::Number(n)) => Ok(FieldValue::Category(n.to_string())),
        (FieldKind::Categorical, Value::Bool(b)) => Ok(FieldValue::Category(b.to_string())),
        (FieldKind::Categorical, other) => Err(format!("expected string, got {}", json_type_name(other))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
