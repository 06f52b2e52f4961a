//! OpenAPI 3.0 model and emission.
//!
//! Schemas stay strongly typed until emission; `to_json` builds the
//! `serde_json::Value` tree (insertion ordered) that YAML/JSON rendering consumes.
use indexmap::{IndexMap, IndexSet};
use serde_json::{json, Map, Value};

pub const OPENAPI_VERSION: &str = "3.0.1";
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";
pub const ROOT_ELEMENT_PREFIX: &str = "rootElement_";
pub const ALL_MEDIA_TYPE: &str = "*/*";
pub const DEFAULT_DESCRIPTION: &str = "Default Description";
pub const X_NAMESPACE_QUALIFIED: &str = "x-namespace-qualified";
pub const X_WSO2_SOAP: &str = "x-wso2-soap";

/// Component schemas keyed by (unique) name.
pub type SchemaMap = IndexMap<String, Schema>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Object,
    Array,
    String,
    Integer,
    Number,
    Boolean,
    Ref,
}

impl SchemaKind {
    fn type_name(self) -> Option<&'static str> {
        match self {
            SchemaKind::Object => Some("object"),
            SchemaKind::Array => Some("array"),
            SchemaKind::String => Some("string"),
            SchemaKind::Integer => Some("integer"),
            SchemaKind::Number => Some("number"),
            SchemaKind::Boolean => Some("boolean"),
            SchemaKind::Ref => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlHint {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    pub kind: SchemaKind,
    pub format: Option<String>,
    pub properties: IndexMap<String, Schema>,
    pub items: Option<Box<Schema>>,
    /// Component name for `SchemaKind::Ref`.
    pub ref_target: Option<String>,
    pub required: IndexSet<String>,
    pub namespace_qualified: bool,
    pub xml: Option<XmlHint>,
    pub extensions: IndexMap<String, Value>,
}

impl Schema {
    fn with_kind(kind: SchemaKind) -> Self {
        Self {
            name: String::new(),
            kind,
            format: None,
            properties: IndexMap::new(),
            items: None,
            ref_target: None,
            required: IndexSet::new(),
            namespace_qualified: false,
            xml: None,
            extensions: IndexMap::new(),
        }
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::with_kind(SchemaKind::Object).named(name)
    }

    pub fn array(items: Schema) -> Self {
        let mut s = Self::with_kind(SchemaKind::Array);
        s.items = Some(Box::new(items));
        s
    }

    pub fn primitive(kind: SchemaKind, format: Option<&str>) -> Self {
        let mut s = Self::with_kind(kind);
        s.format = format.map(str::to_string);
        s
    }

    pub fn reference(target: impl Into<String>) -> Self {
        let mut s = Self::with_kind(SchemaKind::Ref);
        s.ref_target = Some(target.into());
        s
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_object(&self) -> bool {
        self.kind == SchemaKind::Object
    }

    /// Add (or replace) a property, keeping its first position.
    pub fn add_property(&mut self, name: impl Into<String>, schema: Schema, required: bool) {
        let name = name.into();
        if required {
            self.required.insert(name.clone());
        }
        self.properties.insert(name, schema);
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required.contains(field)
    }

    pub fn to_json(&self) -> Value {
        let mut o = Map::new();

        if let Some(target) = &self.ref_target {
            o.insert("$ref".into(), Value::from(format!("{SCHEMA_REF_PREFIX}{target}")));
        }
        if let Some(ty) = self.kind.type_name() {
            o.insert("type".into(), Value::from(ty));
        }
        if let Some(format) = &self.format {
            o.insert("format".into(), Value::from(format.clone()));
        }
        if !self.properties.is_empty() {
            let props = self
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect::<Map<_, _>>();
            o.insert("properties".into(), Value::Object(props));
        }
        if let Some(items) = &self.items {
            o.insert("items".into(), items.to_json());
        }
        if !self.required.is_empty() {
            o.insert(
                "required".into(),
                Value::Array(self.required.iter().cloned().map(Value::from).collect()),
            );
        }
        if let Some(xml) = &self.xml {
            let mut x = Map::new();
            if let Some(ns) = &xml.namespace {
                x.insert("namespace".into(), Value::from(ns.clone()));
            }
            if let Some(prefix) = &xml.prefix {
                x.insert("prefix".into(), Value::from(prefix.clone()));
            }
            o.insert("xml".into(), Value::Object(x));
        }
        if self.is_object() {
            o.insert(X_NAMESPACE_QUALIFIED.into(), Value::Bool(self.namespace_qualified));
        }
        for (k, v) in &self.extensions {
            o.insert(k.clone(), v.clone());
        }
        Value::Object(o)
    }
}

// ------------------------------ Document --------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    #[default]
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapVersion {
    V11,
    V12,
}

impl SoapVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            SoapVersion::V11 => "1.1",
            SoapVersion::V12 => "1.2",
        }
    }

    pub fn envelope_namespace(self) -> &'static str {
        match self {
            SoapVersion::V11 => "http://schemas.xmlsoap.org/soap/envelope/",
            SoapVersion::V12 => "http://www.w3.org/2003/05/soap-envelope",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStyle {
    Rpc,
    Document,
}

impl MessageStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStyle::Rpc => "rpc",
            MessageStyle::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rpc" => Some(MessageStyle::Rpc),
            "document" => Some(MessageStyle::Document),
            _ => None,
        }
    }
}

/// One REST operation derived from a SOAP binding operation.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub operation_id: String,
    pub resource_path: String,
    pub http_verb: HttpVerb,
    pub input: Schema,
    pub output: Schema,
    pub soap_action: String,
    pub target_namespace: String,
    pub soap_version: SoapVersion,
    pub style: MessageStyle,
    pub message_type: Option<MessageStyle>,
    /// Query parameter name -> primitive type name.
    pub query_parameters: IndexMap<String, String>,
}

impl OperationDescriptor {
    /// Operations whose SOAP body is wrapped in an element named after the operation.
    pub fn is_rpc(&self) -> bool {
        self.style == MessageStyle::Rpc || self.message_type == Some(MessageStyle::Rpc)
    }

    pub fn soap_extension(&self) -> Value {
        json!({
            "soap-action": self.soap_action,
            "soap-operation": self.operation_id,
            "namespace": self.target_namespace,
            "x-soap-version": self.soap_version.as_str(),
            "x-soap-style": self.style.as_str(),
            "x-soap-message-type": self.message_type.map(MessageStyle::as_str).unwrap_or(""),
        })
    }

    fn to_json(&self) -> Value {
        let mut o = json!({ "operationId": self.operation_id });
        if self.query_parameters.is_empty() {
            o["requestBody"] = json!({
                "content": { ALL_MEDIA_TYPE: { "schema": self.input.to_json() } },
                "required": true,
            });
        } else {
            o["parameters"] = Value::Array(
                self.query_parameters
                    .iter()
                    .map(|(name, ty)| json!({ "name": name, "in": "query", "schema": { "type": ty } }))
                    .collect(),
            );
        }
        o["responses"] = json!({
            "default": {
                "description": DEFAULT_DESCRIPTION,
                "content": { ALL_MEDIA_TYPE: { "schema": self.output.to_json() } },
            }
        });
        o[X_WSO2_SOAP] = self.soap_extension();
        o
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpenApiDocument {
    pub title: String,
    pub version: String,
    /// Resource path -> operation. Later operations overwrite earlier ones.
    pub paths: IndexMap<String, OperationDescriptor>,
    pub schemas: SchemaMap,
}

impl OpenApiDocument {
    pub fn operations(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.paths.values()
    }

    pub fn to_json(&self) -> Value {
        let mut paths = Map::new();
        for (path, op) in &self.paths {
            let verb = match op.http_verb {
                HttpVerb::Get => "get",
                HttpVerb::Post => "post",
            };
            paths.insert(path.clone(), json!({ verb: op.to_json() }));
        }
        let schemas = self
            .schemas
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<Map<_, _>>();
        json!({
            "openapi": OPENAPI_VERSION,
            "info": { "title": self.title, "version": self.version },
            "paths": paths,
            "components": { "schemas": schemas },
        })
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_json())
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_json())
    }
}

// ------------------------------- Tests ------------------------------------ //
