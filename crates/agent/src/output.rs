//! Structured output shapes and the coercion step that turns raw model output
//! into a payload the caller can rely on.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Boolean,
    Integer,
    Number,
    Any,
}

impl FieldKind {
    fn schema_type(self) -> Option<&'static str> {
        match self {
            Self::String => Some("string"),
            Self::Boolean => Some("boolean"),
            Self::Integer => Some("integer"),
            Self::Number => Some("number"),
            Self::Any => None,
        }
    }

    /// Lax coercion: numeric and boolean strings are accepted for numeric and
    /// boolean fields, everything else must already have the right JSON type.
    fn coerce(self, value: Value) -> Option<Value> {
        match (self, value) {
            (Self::Any, value) => Some(value),
            (Self::String, value @ Value::String(_)) => Some(value),
            (Self::Boolean, value @ Value::Bool(_)) => Some(value),
            (Self::Boolean, Value::String(text)) => match text.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (Self::Integer, Value::Number(number)) if number.is_i64() || number.is_u64() => {
                Some(Value::Number(number))
            }
            (Self::Integer, Value::String(text)) => {
                text.trim().parse::<i64>().ok().map(Value::from)
            }
            (Self::Number, value @ Value::Number(_)) => Some(value),
            (Self::Number, Value::String(text)) => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OutputFormatError {
    #[error("`{shape}` output is not valid JSON: {message}")]
    NotJson { shape: String, message: String },
    #[error("`{shape}` output must be a JSON object, got {found}")]
    NotAnObject { shape: String, found: &'static str },
    #[error("`{shape}` output is missing required field `{field}`")]
    MissingField { shape: String, field: String },
    #[error("`{shape}` field `{field}` expected {expected:?}, got {found}")]
    WrongType { shape: String, field: String, expected: FieldKind, found: &'static str },
}

/// The object shape an agent's final output must take.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputShape {
    name: String,
    fields: Vec<FieldSpec>,
}

impl OutputShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new() }
    }

    pub fn required(self, field: impl Into<String>, kind: FieldKind) -> Self {
        self.field(field, kind, true)
    }

    pub fn optional(self, field: impl Into<String>, kind: FieldKind) -> Self {
        self.field(field, kind, false)
    }

    fn field(mut self, field: impl Into<String>, kind: FieldKind, required: bool) -> Self {
        let field = field.into();
        self.fields.retain(|existing| existing.name != field);
        self.fields.push(FieldSpec { name: field, kind, required });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let schema = match field.kind.schema_type() {
                Some(kind) if field.required => json!({ "type": kind }),
                Some(kind) => json!({ "type": [kind, "null"] }),
                None => json!({}),
            };
            properties.insert(field.name.clone(), schema);
        }
        let required = self
            .fields
            .iter()
            .filter(|field| field.required)
            .map(|field| Value::String(field.name.clone()))
            .collect::<Vec<_>>();

        json!({
            "title": self.name,
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Validate `raw` against this shape.
    ///
    /// String output is parsed as JSON first. Fields not declared by the
    /// shape are dropped; optional fields that are absent come back as `null`.
    pub fn coerce(&self, raw: Value) -> Result<Value, OutputFormatError> {
        let raw = match raw {
            Value::String(text) => serde_json::from_str::<Value>(strip_code_fence(&text))
                .map_err(|error| OutputFormatError::NotJson {
                    shape: self.name.clone(),
                    message: error.to_string(),
                })?,
            other => other,
        };

        let mut object = match raw {
            Value::Object(object) => object,
            other => {
                return Err(OutputFormatError::NotAnObject {
                    shape: self.name.clone(),
                    found: json_type(&other),
                })
            }
        };

        let mut coerced = Map::new();
        for field in &self.fields {
            match object.remove(&field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(OutputFormatError::MissingField {
                        shape: self.name.clone(),
                        field: field.name.clone(),
                    });
                }
                None | Some(Value::Null) => {
                    coerced.insert(field.name.clone(), Value::Null);
                }
                Some(value) => {
                    let found = json_type(&value);
                    let value =
                        field.kind.coerce(value).ok_or_else(|| OutputFormatError::WrongType {
                            shape: self.name.clone(),
                            field: field.name.clone(),
                            expected: field.kind,
                            found,
                        })?;
                    coerced.insert(field.name.clone(), value);
                }
            }
        }

        Ok(Value::Object(coerced))
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Any info string (`json`, `JSON`, `jsonc`, ...) ends at the first newline.
    let body = match body.split_once('\n') {
        Some((info, rest)) if info.trim().chars().all(|ch| ch.is_ascii_alphanumeric()) => rest,
        _ => match body.get(..4) {
            Some(info) if info.eq_ignore_ascii_case("json") => &body[4..],
            _ => body,
        },
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
