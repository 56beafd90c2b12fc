//! Tool descriptors and validated arguments.

use super::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// The type a parameter is coerced to before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamKind {
    fn schema_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// Extra constraints on a string parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamFormat {
    /// An IANA zone name such as `America/New_York`, or `UTC`.
    IanaTimezone,
}

/// One parameter of a tool's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ParamFormat>,
}

impl ParamSpec {
    fn new(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
            default: None,
            format: None,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamKind::String, description)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Integer, description)
    }

    pub fn number(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Number, description)
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Boolean, description)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Make the parameter optional and fill in `value` when it is absent.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.required = false;
        self.default = Some(value.into());
        self
    }

    pub fn with_format(mut self, format: ParamFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// A tool definition exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    /// Guidance the model uses to decide when to pick this tool.
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.required)
    }

    /// Render the parameters as an OpenAPI-style object schema.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut description = param.description.clone();
            if param.format == Some(ParamFormat::IanaTimezone) {
                description.push_str(" Must be an IANA timezone name.");
            }
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.kind.schema_type(),
                    "description": description,
                }),
            );
        }
        let required: Vec<&str> = self.required_params().map(|p| p.name.as_str()).collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Arguments that passed schema validation.
///
/// Only declared parameters survive, already coerced to their declared kind,
/// with defaults applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub(crate) fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::validation(name, "expected a string"))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Result<i64, ToolError> {
        self.get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| ToolError::validation(name, "expected an integer"))
    }

    pub fn f64(&self, name: &str) -> Result<f64, ToolError> {
        self.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| ToolError::validation(name, "expected a number"))
    }

    pub fn bool(&self, name: &str) -> Result<bool, ToolError> {
        self.get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| ToolError::validation(name, "expected a boolean"))
    }
}
