use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::openapi::{Schema, SchemaKind, SchemaMap, XmlHint, ROOT_ELEMENT_PREFIX};
use crate::xsd::{Attribute, DataType, Element, QName, SchemaDocument, TypeGraph, TypeNode, XSD_NS};

pub const DEFAULT_OBJECT_NAME: &str = "Default_Object";
pub const EXTENSION_PROPERTY: &str = "ExtensionObject";
pub const BASE_CONTENT_KEYWORD: &str = "_base";
pub const ATTR_CONTENT_KEYWORD: &str = "_attr";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub fn strip_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, "").into_owned()
}

/// Fixed XSD built-in → OpenAPI primitive table. Unknown names become `$ref`s.
pub fn lower_primitive(type_name: &str) -> Schema {
    use SchemaKind::*;
    match type_name {
        "string" | "anyType" | "duration" | "time" | "gYearMonth" | "gMonthDay" | "gYear"
        | "gDay" | "gMonth" | "anyURI" | "QName" | "normalizedString" | "token" => {
            Schema::primitive(String, None)
        }
        "dateTime" => Schema::primitive(String, Some("date-time")),
        "date" => Schema::primitive(String, Some("date")),
        "hexBinary" => Schema::primitive(String, Some("binary")),
        "base64Binary" | "unsignedByte" => Schema::primitive(String, Some("byte")),
        "integer" | "nonPositiveInteger" | "negativeInteger" | "positiveInteger"
        | "nonNegativeInteger" | "unsignedInt" | "int" | "short" | "unsignedShort" => {
            Schema::primitive(Integer, Some("int32"))
        }
        "long" | "unsignedLong" => Schema::primitive(Integer, Some("int64")),
        "boolean" => Schema::primitive(Boolean, None),
        "decimal" | "float" => Schema::primitive(Number, Some("float")),
        "double" => Schema::primitive(Number, Some("double")),
        other => Schema::reference(other),
    }
}

/// A type reference; XSD built-ins outside the table are sampled as strings
/// instead of pointing at a component that never exists.
pub fn lower_type_ref(ty: &QName) -> Schema {
    let schema = lower_primitive(&ty.local);
    if schema.kind == SchemaKind::Ref && ty.namespace.as_deref() == Some(XSD_NS) {
        debug!("built-in type `{}` has no dedicated mapping; treating it as a string", ty.local);
        return Schema::primitive(SchemaKind::String, None);
    }
    schema
}

// Collect everything the graph defines into one component map.
pub fn lower(graph: &TypeGraph) -> SchemaMap {
    let mut out = SchemaMap::new();
    for doc in &graph.documents {
        let mut lowerer = Lowerer::new(graph, doc);
        for data_type in &doc.data_types {
            let schema = lowerer.lower_data_type(data_type, None);
            insert_schema(&mut out, schema);
        }
        for group in &doc.groups {
            let Some(name) = &group.name else { continue };
            let mut schema = lowerer.object_for(Some(name), &strip_whitespace(&name.local));
            let mut bag = Bag { target: &mut schema, required: true };
            lowerer.flatten(TypeNode::Group(group), &mut bag);
            insert_schema(&mut out, schema);
        }
        for element in &doc.elements {
            let Some((local, schema)) = lowerer.lower_element(element) else { continue };
            insert_schema(&mut out, schema.named(format!("{ROOT_ELEMENT_PREFIX}{local}")));
        }
    }
    out
}

fn insert_schema(out: &mut SchemaMap, schema: Schema) {
    if out.contains_key(&schema.name) {
        debug!("schema `{}` defined more than once; keeping the last definition", schema.name);
    }
    out.insert(schema.name.clone(), schema);
}

/// Property accumulator threaded through the particle walk.
struct Bag<'s> {
    target: &'s mut Schema,
    /// False once we are below a `choice`.
    required: bool,
}

struct Lowerer<'g> {
    graph: &'g TypeGraph,
    doc: &'g SchemaDocument,
    /// Groups currently being merged; stops `group ref` cycles.
    visiting: HashSet<QName>,
}

impl<'g> Lowerer<'g> {
    fn new(graph: &'g TypeGraph, doc: &'g SchemaDocument) -> Self {
        Self { graph, doc, visiting: HashSet::new() }
    }

    fn object_for(&self, type_name: Option<&QName>, name: &str) -> Schema {
        let mut schema = Schema::object(name);
        let target = self.doc.target_namespace.as_deref().unwrap_or_default();
        schema.namespace_qualified = self.doc.element_form_qualified && !target.is_empty();
        if let Some(ns) = type_name.and_then(|q| q.namespace.as_ref()) {
            schema.xml = Some(XmlHint {
                namespace: Some(ns.clone()),
                prefix: type_name.and_then(|q| q.prefix.clone()),
            });
        }
        schema
    }

    fn lower_data_type(&mut self, dt: &DataType, fallback: Option<&str>) -> Schema {
        let name = match (&dt.name, fallback) {
            (Some(q), _) => strip_whitespace(&q.local),
            (None, Some(f)) => f.to_string(),
            (None, None) => DEFAULT_OBJECT_NAME.to_string(),
        };

        if let Some(base) = &dt.restriction_base {
            return lower_type_ref(base).named(name);
        }

        let mut schema = self.object_for(dt.name.as_ref(), &name);
        let mut bag = Bag { target: &mut schema, required: true };
        self.flatten(TypeNode::DataType(dt), &mut bag);
        schema
    }

    /// Single walker over every node kind; all content lands in `bag`.
    fn flatten(&mut self, node: TypeNode<'_>, bag: &mut Bag<'_>) {
        match node {
            TypeNode::DataType(dt) => {
                if let Some(base) = &dt.extension_base {
                    let key = if dt.simple_content { BASE_CONTENT_KEYWORD } else { EXTENSION_PROPERTY };
                    bag.target.add_property(key, lower_type_ref(base), false);
                }
                if let Some(seq) = &dt.sequence {
                    self.flatten(TypeNode::Sequence(seq), bag);
                }
                if let Some(choice) = &dt.choice {
                    self.flatten(TypeNode::Choice(choice), bag);
                }
                if let Some(group) = &dt.group {
                    self.flatten(TypeNode::Group(group), bag);
                }
                for attr in &dt.attributes {
                    self.flatten(TypeNode::Attribute(attr), bag);
                }
            }
            TypeNode::Sequence(seq) => {
                for el in &seq.elements {
                    self.flatten(TypeNode::Element(el), bag);
                }
                for inner in &seq.sequences {
                    self.flatten(TypeNode::Sequence(inner), bag);
                }
                for choice in &seq.choices {
                    self.flatten(TypeNode::Choice(choice), bag);
                }
                for group in &seq.groups {
                    self.flatten(TypeNode::Group(group), bag);
                }
            }
            TypeNode::Choice(choice) => {
                let outer = std::mem::replace(&mut bag.required, false);
                for seq in &choice.sequences {
                    self.flatten(TypeNode::Sequence(seq), bag);
                }
                for inner in &choice.choices {
                    self.flatten(TypeNode::Choice(inner), bag);
                }
                for group in &choice.groups {
                    self.flatten(TypeNode::Group(group), bag);
                }
                for el in &choice.elements {
                    self.flatten(TypeNode::Element(el), bag);
                }
                bag.required = outer;
            }
            TypeNode::Group(group) => {
                for choice in &group.choices {
                    self.flatten(TypeNode::Choice(choice), bag);
                }
                for seq in &group.sequences {
                    self.flatten(TypeNode::Sequence(seq), bag);
                }
                if let Some(key) = &group.ref_key {
                    self.merge_group_ref(key, bag);
                }
            }
            TypeNode::Element(el) => {
                if let Some((local, schema)) = self.lower_element(el) {
                    let required = bag.required && el.min_occurs > 0;
                    bag.target.add_property(local, schema, required);
                }
            }
            TypeNode::Attribute(attr) => {
                if let Some((local, schema)) = self.lower_attribute(attr) {
                    let attrs = bag
                        .target
                        .properties
                        .entry(ATTR_CONTENT_KEYWORD.to_string())
                        .or_insert_with(|| Schema::object(ATTR_CONTENT_KEYWORD));
                    attrs.add_property(local, schema, attr.required);
                }
            }
        }
    }

    fn merge_group_ref(&mut self, key: &QName, bag: &mut Bag<'_>) {
        let graph = self.graph;
        let Some(group) = graph.global_group(key) else {
            warn!("group `{key}` is referenced but never defined");
            return;
        };
        if !self.visiting.insert(key.clone()) {
            warn!("group `{key}` references itself; skipping the cycle");
            return;
        }
        self.flatten(TypeNode::Group(group), bag);
        self.visiting.remove(key);
    }

    /// Returns the property name (element local name) and its schema.
    fn lower_element(&mut self, el: &Element) -> Option<(String, Schema)> {
        let wrap = |s: Schema| if el.is_array { Schema::array(s) } else { s };
        let local = el
            .name
            .as_ref()
            .or(el.ref_key.as_ref())
            .map(|q| strip_whitespace(&q.local))
            .unwrap_or_default();

        let schema = if let Some(ty) = &el.type_ref {
            wrap(lower_type_ref(ty))
        } else if let Some(key) = &el.ref_key {
            let target = format!("{ROOT_ELEMENT_PREFIX}{}", strip_whitespace(&key.local));
            wrap(Schema::reference(target))
        } else if let Some(inline) = &el.inline_type {
            wrap(self.lower_data_type(inline, Some(&local)))
        } else {
            warn!("data type for element `{local}` could not be resolved; skipping it");
            return None;
        };
        Some((local.clone(), schema.named(local)))
    }

    fn lower_attribute(&mut self, attr: &Attribute) -> Option<(String, Schema)> {
        let local = attr
            .name
            .as_ref()
            .or(attr.ref_key.as_ref())
            .map(|q| strip_whitespace(&q.local))
            .unwrap_or_default();

        let schema = if let Some(ty) = &attr.type_ref {
            lower_type_ref(ty)
        } else if let Some(inline) = &attr.inline_type {
            self.lower_data_type(inline, Some(&local))
        } else if let Some(key) = &attr.ref_key {
            let graph = self.graph;
            match graph.global_attribute(key).filter(|g| g.ref_key.is_none()) {
                Some(global) => return self.lower_attribute(global).map(|(_, s)| (local, s)),
                None => {
                    warn!("attribute `{key}` is referenced but never defined");
                    return None;
                }
            }
        } else {
            warn!("data type for attribute `{local}` could not be resolved; skipping it");
            return None;
        };
        Some((local.clone(), schema.named(local)))
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsd::{Choice, Group, Sequence};
    use rstest::rstest;

    const NS: &str = "http://example.com/";

    fn q(local: &str) -> Option<QName> {
        Some(QName::new(Some(NS), local))
    }

    fn xs(local: &str) -> Option<QName> {
        Some(QName::new(Some("http://www.w3.org/2001/XMLSchema"), local))
    }

    fn el(name: &str, ty: &str) -> Element {
        Element { name: q(name), type_ref: xs(ty), ..Element::default() }
    }

    fn graph(doc: SchemaDocument) -> TypeGraph {
        TypeGraph { documents: vec![doc] }
    }

    #[rstest]
    #[case("string", SchemaKind::String, None)]
    #[case("token", SchemaKind::String, None)]
    #[case("dateTime", SchemaKind::String, Some("date-time"))]
    #[case("date", SchemaKind::String, Some("date"))]
    #[case("hexBinary", SchemaKind::String, Some("binary"))]
    #[case("base64Binary", SchemaKind::String, Some("byte"))]
    #[case("unsignedByte", SchemaKind::String, Some("byte"))]
    #[case("int", SchemaKind::Integer, Some("int32"))]
    #[case("nonNegativeInteger", SchemaKind::Integer, Some("int32"))]
    #[case("unsignedShort", SchemaKind::Integer, Some("int32"))]
    #[case("long", SchemaKind::Integer, Some("int64"))]
    #[case("unsignedLong", SchemaKind::Integer, Some("int64"))]
    #[case("boolean", SchemaKind::Boolean, None)]
    #[case("decimal", SchemaKind::Number, Some("float"))]
    #[case("float", SchemaKind::Number, Some("float"))]
    #[case("double", SchemaKind::Number, Some("double"))]
    fn primitive_table(#[case] name: &str, #[case] kind: SchemaKind, #[case] format: Option<&str>) {
        let s = lower_primitive(name);
        assert_eq!(s.kind, kind);
        assert_eq!(s.format.as_deref(), format);
    }

    #[test]
    fn unknown_type_becomes_reference() {
        let s = lower_primitive("CustomerType");
        assert_eq!(s.kind, SchemaKind::Ref);
        assert_eq!(s.ref_target.as_deref(), Some("CustomerType"));
    }

    #[rstest]
    #[case("byte")]
    #[case("anySimpleType")]
    #[case("ID")]
    #[case("language")]
    fn unlisted_builtins_are_strings(#[case] name: &str) {
        let s = lower_type_ref(&QName::new(Some(XSD_NS), name));
        assert_eq!(s.kind, SchemaKind::String);
        assert_eq!(s.ref_target, None);
        // the same local name in a user namespace stays a reference
        let user = lower_type_ref(&QName::new(Some("urn:shop"), name));
        assert_eq!(user.ref_target.as_deref(), Some(name));
    }

    #[test]
    fn extension_and_sequence_merge_into_one_schema() {
        let dt = DataType {
            name: q("Manager"),
            extension_base: q("Employee"),
            sequence: Some(Sequence {
                elements: vec![el("reports", "int"), el("title", "string")],
                ..Sequence::default()
            }),
            ..DataType::default()
        };
        let out = lower(&graph(SchemaDocument {
            target_namespace: Some(NS.into()),
            data_types: vec![dt],
            ..SchemaDocument::default()
        }));
        let manager = &out["Manager"];
        let keys: Vec<_> = manager.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![EXTENSION_PROPERTY, "reports", "title"]);
        assert_eq!(manager.properties[EXTENSION_PROPERTY].ref_target.as_deref(), Some("Employee"));
        assert!(!manager.namespace_qualified);
        assert_eq!(manager.xml.as_ref().and_then(|x| x.namespace.as_deref()), Some(NS));
    }

    #[test]
    fn choice_content_is_never_required_and_optional_elements_are_not_either() {
        let mut optional = el("nick", "string");
        optional.min_occurs = 0;
        let dt = DataType {
            name: q("Person"),
            sequence: Some(Sequence {
                elements: vec![el("name", "string"), optional],
                choices: vec![Choice { elements: vec![el("email", "string"), el("phone", "string")], ..Choice::default() }],
                ..Sequence::default()
            }),
            ..DataType::default()
        };
        let out = lower(&graph(SchemaDocument { data_types: vec![dt], ..SchemaDocument::default() }));
        let person = &out["Person"];
        assert_eq!(person.properties.len(), 4);
        assert!(person.is_required("name"));
        assert!(!person.is_required("nick"));
        assert!(!person.is_required("email"));
        assert!(!person.is_required("phone"));
    }

    #[test]
    fn arrays_refs_and_inline_types() {
        let mut tags = el("tags", "string");
        tags.is_array = true;
        let by_ref = Element { ref_key: q("Address"), ..Element::default() };
        let inline = Element {
            name: q("meta"),
            inline_type: Some(Box::new(DataType {
                sequence: Some(Sequence { elements: vec![el("k", "string")], ..Sequence::default() }),
                ..DataType::default()
            })),
            ..Element::default()
        };
        let untyped = Element { name: q("ghost"), ..Element::default() };
        let dt = DataType {
            name: q("Item"),
            sequence: Some(Sequence { elements: vec![tags, by_ref, inline, untyped], ..Sequence::default() }),
            ..DataType::default()
        };
        let out = lower(&graph(SchemaDocument { data_types: vec![dt], ..SchemaDocument::default() }));
        let item = &out["Item"];
        assert_eq!(item.properties["tags"].kind, SchemaKind::Array);
        assert_eq!(item.properties["tags"].items.as_ref().unwrap().kind, SchemaKind::String);
        assert_eq!(item.properties["Address"].ref_target.as_deref(), Some("rootElement_Address"));
        assert_eq!(item.properties["meta"].name, "meta");
        assert!(item.properties["meta"].properties.contains_key("k"));
        assert!(!item.properties.contains_key("ghost"));
    }

    #[test]
    fn root_elements_are_prefixed_and_groups_emitted() {
        let group = Group {
            name: q("Common"),
            sequences: vec![Sequence { elements: vec![el("id", "long")], ..Sequence::default() }],
            ..Group::default()
        };
        let uses_group = DataType {
            name: q("Thing"),
            group: Some(Group { ref_key: q("Common"), ..Group::default() }),
            ..DataType::default()
        };
        let doc = SchemaDocument {
            target_namespace: Some(NS.into()),
            element_form_qualified: true,
            elements: vec![Element { name: q("Thing"), type_ref: q("Thing"), ..Element::default() }],
            groups: vec![group],
            data_types: vec![uses_group],
            ..SchemaDocument::default()
        };
        let out = lower(&graph(doc));
        assert!(out.contains_key("Common"));
        assert!(out["Thing"].properties.contains_key("id"));
        assert!(out["Thing"].namespace_qualified);
        assert_eq!(out["rootElement_Thing"].ref_target.as_deref(), Some("Thing"));
    }

    #[test]
    fn self_referencing_group_terminates() {
        let group = Group {
            name: q("Loop"),
            ref_key: q("Loop"),
            sequences: vec![Sequence { elements: vec![el("x", "int")], ..Sequence::default() }],
            ..Group::default()
        };
        let out = lower(&graph(SchemaDocument { groups: vec![group], ..SchemaDocument::default() }));
        assert!(out["Loop"].properties.contains_key("x"));
    }

    #[test]
    fn attributes_and_simple_content() {
        let dt = DataType {
            name: q("Price"),
            extension_base: xs("decimal"),
            simple_content: true,
            attributes: vec![Attribute { name: q("currency"), type_ref: xs("string"), required: true, ..Attribute::default() }],
            ..DataType::default()
        };
        let simple = DataType { name: q("Colour"), restriction_base: xs("string"), ..DataType::default() };
        let out = lower(&graph(SchemaDocument { data_types: vec![dt, simple], ..SchemaDocument::default() }));
        let price = &out["Price"];
        assert_eq!(price.properties[BASE_CONTENT_KEYWORD].kind, SchemaKind::Number);
        let attrs = &price.properties[ATTR_CONTENT_KEYWORD];
        assert!(attrs.is_required("currency"));
        assert_eq!(out["Colour"].kind, SchemaKind::String);
    }

    #[test]
    fn later_definitions_overwrite_earlier_ones() {
        let a = DataType { name: q("Dup"), sequence: Some(Sequence { elements: vec![el("a", "int")], ..Sequence::default() }), ..DataType::default() };
        let b = DataType { name: q("Dup"), sequence: Some(Sequence { elements: vec![el("b", "int")], ..Sequence::default() }), ..DataType::default() };
        let out = lower(&graph(SchemaDocument { data_types: vec![a, b], ..SchemaDocument::default() }));
        assert_eq!(out.len(), 1);
        assert!(out["Dup"].properties.contains_key("b"));
    }
}
