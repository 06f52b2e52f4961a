// In-memory XML-Schema type graph. No roxmltree types here.

use std::fmt;

pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// Namespace-qualified XML name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
    pub prefix: Option<String>,
}

impl QName {
    pub fn new(namespace: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            local: local.into(),
            prefix: None,
        }
    }

    pub fn local(local: impl Into<String>) -> Self {
        Self::new(None, local)
    }

    pub fn with_prefix(mut self, prefix: Option<&str>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty()).map(str::to_string);
        self
    }

    /// Same namespace and local part; the prefix is only a spelling.
    pub fn same_name(&self, other: &QName) -> bool {
        self.local == other.local && self.namespace == other.namespace
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataType {
    pub name: Option<QName>,
    pub extension_base: Option<QName>,
    /// `extension_base` came from `simpleContent` (base is the text content).
    pub simple_content: bool,
    /// Base of a `simpleType` restriction.
    pub restriction_base: Option<QName>,
    pub sequence: Option<Sequence>,
    pub choice: Option<Choice>,
    pub group: Option<Group>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: Option<QName>,
    pub type_ref: Option<QName>,
    pub inline_type: Option<Box<DataType>>,
    pub ref_key: Option<QName>,
    pub is_array: bool,
    pub min_occurs: u32,
}

impl Default for Element {
    fn default() -> Self {
        Self {
            name: None,
            type_ref: None,
            inline_type: None,
            ref_key: None,
            is_array: false,
            min_occurs: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Attribute {
    pub name: Option<QName>,
    pub type_ref: Option<QName>,
    pub inline_type: Option<Box<DataType>>,
    pub ref_key: Option<QName>,
    pub required: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Group {
    pub name: Option<QName>,
    pub ref_key: Option<QName>,
    pub sequences: Vec<Sequence>,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Default)]
pub struct Sequence {
    pub elements: Vec<Element>,
    pub sequences: Vec<Sequence>,
    pub choices: Vec<Choice>,
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, Default)]
pub struct Choice {
    pub elements: Vec<Element>,
    pub choices: Vec<Choice>,
    pub groups: Vec<Group>,
    pub sequences: Vec<Sequence>,
}

/// Borrowed view over any node of the graph, used by tree walkers.
#[derive(Debug, Clone, Copy)]
pub enum TypeNode<'a> {
    DataType(&'a DataType),
    Element(&'a Element),
    Attribute(&'a Attribute),
    Group(&'a Group),
    Sequence(&'a Sequence),
    Choice(&'a Choice),
}

/// One `xs:schema` document.
#[derive(Debug, Clone, Default)]
pub struct SchemaDocument {
    pub target_namespace: Option<String>,
    pub element_form_qualified: bool,
    pub elements: Vec<Element>,
    pub attributes: Vec<Attribute>,
    pub groups: Vec<Group>,
    pub data_types: Vec<DataType>,
}

/// Every schema document reachable from one WSDL.
#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    pub documents: Vec<SchemaDocument>,
}

impl TypeGraph {
    pub fn global_group(&self, name: &QName) -> Option<&Group> {
        self.documents
            .iter()
            .flat_map(|doc| doc.groups.iter())
            .find(|g| g.name.as_ref().is_some_and(|n| n.same_name(name)))
    }

    pub fn global_attribute(&self, name: &QName) -> Option<&Attribute> {
        self.documents
            .iter()
            .flat_map(|doc| doc.attributes.iter())
            .find(|a| a.name.as_ref().is_some_and(|n| n.same_name(name)))
    }
}
