//! Declared parameter schemas and the validator that runs before dispatch.
//!
//! A schema is fixed at registration time. `validate` is pure: it either
//! returns a [`ValidatedArgs`] with defaults filled in, or the first
//! [`HubError::SchemaViolation`] it finds.

use crate::error::{HubError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// ParamType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Any,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Any => "any",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
            ParamType::Any => true,
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// ParamSpec / ActionSchema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub ty: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn required(ty: ParamType) -> Self {
        Self {
            ty,
            required: true,
            default: None,
            description: None,
        }
    }

    pub fn optional(ty: ParamType) -> Self {
        Self {
            ty,
            required: false,
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSchema {
    #[serde(default)]
    pub params: BTreeMap<String, ParamSpec>,
    /// Reject arguments the schema does not declare.
    #[serde(default = "default_strict")]
    pub strict: bool,
}

fn default_strict() -> bool {
    true
}

impl Default for ActionSchema {
    fn default() -> Self {
        Self {
            params: BTreeMap::new(),
            strict: true,
        }
    }
}

impl ActionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.params.insert(name.into(), spec);
        self
    }

    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }

    /// Check `args` against this schema.
    ///
    /// `null` is treated as an empty object. A field explicitly set to
    /// `null` counts as absent.
    pub fn validate(&self, args: &Value) -> Result<ValidatedArgs> {
        let supplied = match args {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(HubError::schema(
                    "$args",
                    format!("expected an object, got {}", type_name(other)),
                ))
            }
        };

        if self.strict {
            if let Some(unknown) = supplied.keys().find(|k| !self.params.contains_key(*k)) {
                return Err(HubError::schema(unknown.clone(), "unrecognized field"));
            }
        }

        let mut out = Map::new();
        for (name, spec) in &self.params {
            match supplied.get(name) {
                Some(value) if !value.is_null() => {
                    if !spec.ty.accepts(value) {
                        return Err(HubError::schema(
                            name.clone(),
                            format!(
                                "expected {}, got {}",
                                spec.ty.as_str(),
                                type_name(value)
                            ),
                        ));
                    }
                    out.insert(name.clone(), value.clone());
                }
                _ => {
                    if let Some(default) = &spec.default {
                        out.insert(name.clone(), default.clone());
                    } else if spec.required {
                        return Err(HubError::schema(
                            name.clone(),
                            "required field is missing",
                        ));
                    }
                }
            }
        }

        if !self.strict {
            for (name, value) in supplied {
                out.entry(name).or_insert(value);
            }
        }

        Ok(ValidatedArgs(out))
    }

    /// Render as a JSON Schema object for agent-facing discovery.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, spec) in &self.params {
            let mut prop = Map::new();
            if spec.ty != ParamType::Any {
                prop.insert("type".to_string(), json!(spec.ty.as_str()));
            }
            if let Some(desc) = &spec.description {
                prop.insert("description".to_string(), json!(desc));
            }
            if let Some(default) = &spec.default {
                prop.insert("default".to_string(), default.clone());
            }
            properties.insert(name.clone(), Value::Object(prop));
            if spec.required {
                required.push(json!(name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": !self.strict,
        })
    }
}

// ---------------------------------------------------------------------------
// ValidatedArgs
// ---------------------------------------------------------------------------

/// Arguments that passed schema validation, with defaults applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArgs(Map<String, Value>);

impl ValidatedArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Deserialize into the handler's typed argument struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_value())?)
    }
}
