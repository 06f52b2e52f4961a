//! Sample payloads generated from OpenAPI schemas.
//!
//! Every field remembers the object schema that declared it (`origin`), which is
//! what the template synthesizer later needs for qualification and optionality.
use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::error::ExampleError;
use crate::openapi::{Schema, SchemaKind, SchemaMap};

pub const SAMPLE_STRING: &str = "string";
pub const SAMPLE_DATE: &str = "2015-07-20";
pub const SAMPLE_DATE_TIME: &str = "2015-07-20T15:49:04-07:00";
pub const SAMPLE_BYTE: &str = "Ynl0ZQ==";
pub const SAMPLE_BINARY: &str = "binary";

/// What the enclosing object schema says about one of its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Component name of the enclosing schema; `None` for anonymous types.
    pub schema: Option<String>,
    pub namespace_qualified: bool,
    pub required: bool,
}

impl Declaration {
    fn field_of(object: &Schema, component: Option<&str>, field: &str) -> Self {
        Self {
            schema: component.map(str::to_string),
            namespace_qualified: object.namespace_qualified,
            required: object.is_required(field),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Example {
    Object { origin: Option<Declaration>, fields: IndexMap<String, Example> },
    Array { origin: Option<Declaration>, items: Vec<Example> },
    Value { origin: Option<Declaration>, value: Value },
}

impl Example {
    pub fn origin(&self) -> Option<&Declaration> {
        match self {
            Example::Object { origin, .. } | Example::Array { origin, .. } | Example::Value { origin, .. } => {
                origin.as_ref()
            }
        }
    }

    fn with_origin(mut self, owner: Option<&Declaration>) -> Self {
        let slot = match &mut self {
            Example::Object { origin, .. } | Example::Array { origin, .. } | Example::Value { origin, .. } => origin,
        };
        *slot = owner.cloned();
        self
    }

    /// Plain JSON, no origins.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => Example::Object {
                origin: None,
                fields: map.iter().map(|(k, v)| (k.clone(), Example::from_json(v))).collect(),
            },
            Value::Array(items) => Example::Array { origin: None, items: items.iter().map(Example::from_json).collect() },
            other => Example::Value { origin: None, value: other.clone() },
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Example::Object { fields, .. } => {
                Value::Object(fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect::<Map<_, _>>())
            }
            Example::Array { items, .. } => Value::Array(items.iter().map(Example::to_json).collect()),
            Example::Value { value, .. } => value.clone(),
        }
    }
}

pub struct ExampleBuilder<'s> {
    schemas: &'s SchemaMap,
    /// Component names being expanded; a repeat means a cycle.
    stack: Vec<String>,
}

impl<'s> ExampleBuilder<'s> {
    pub fn new(schemas: &'s SchemaMap) -> Self {
        Self { schemas, stack: Vec::new() }
    }

    pub fn build(&mut self, schema: &Schema) -> Result<Example, ExampleError> {
        self.stack.clear();
        self.node(schema, None, None)
    }

    /// `owner` describes the field `schema` sits in; `component` is set when
    /// `schema` itself is a component body.
    fn node(
        &mut self,
        schema: &Schema,
        owner: Option<&Declaration>,
        component: Option<&str>,
    ) -> Result<Example, ExampleError> {
        let example = match schema.kind {
            SchemaKind::Ref => {
                let Some(target) = schema.ref_target.as_deref().filter(|t| !t.is_empty()) else {
                    return Err(ExampleError::MissingTarget(schema.name.clone()));
                };
                let schemas = self.schemas;
                let Some(resolved) = schemas.get(target) else {
                    warn!("schema reference `{target}` does not resolve to a component; sampling it as a string");
                    return Ok(Example::Value { origin: owner.cloned(), value: json!(SAMPLE_STRING) });
                };
                if self.stack.iter().any(|s| s == target) {
                    return Ok(Example::Object { origin: owner.cloned(), fields: IndexMap::new() });
                }
                self.stack.push(target.to_string());
                let inner = self.node(resolved, owner, Some(target));
                self.stack.pop();
                inner?
            }
            SchemaKind::Object => {
                let mut fields = IndexMap::new();
                for (name, prop) in &schema.properties {
                    let declaration = Declaration::field_of(schema, component, name);
                    fields.insert(name.clone(), self.node(prop, Some(&declaration), None)?);
                }
                Example::Object { origin: None, fields }
            }
            SchemaKind::Array => {
                let items = match &schema.items {
                    Some(items) => vec![self.node(items, owner, None)?],
                    None => Vec::new(),
                };
                Example::Array { origin: None, items }
            }
            SchemaKind::String => Example::Value { origin: None, value: json!(sample_string(schema.format.as_deref())) },
            SchemaKind::Integer => Example::Value { origin: None, value: json!(0) },
            SchemaKind::Number => Example::Value { origin: None, value: json!(0.0) },
            SchemaKind::Boolean => Example::Value { origin: None, value: json!(true) },
        };
        Ok(example.with_origin(owner))
    }
}

fn sample_string(format: Option<&str>) -> &'static str {
    match format {
        Some("date") => SAMPLE_DATE,
        Some("date-time") => SAMPLE_DATE_TIME,
        Some("byte") => SAMPLE_BYTE,
        Some("binary") => SAMPLE_BINARY,
        _ => SAMPLE_STRING,
    }
}
