//! `xs:schema` element → [`SchemaDocument`].
use roxmltree::Node;
use tracing::{debug, warn};

pub use crate::xsd::XSD_NS;
use crate::xsd::{Attribute, Choice, DataType, Element, Group, QName, SchemaDocument, Sequence};

/// `import`/`include` found at the top of a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReference {
    pub schema_location: String,
    /// Includes take the including schema's target namespace when they have none.
    pub is_include: bool,
}

pub fn is_xsd<'a>(node: &Node<'a, '_>, local: &str) -> bool {
    node.is_element() && node.tag_name().name() == local && node.tag_name().namespace() == Some(XSD_NS)
}

fn xsd_children<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().namespace() == Some(XSD_NS))
}

/// Collect the `schemaLocation` of every `import` and `include`.
pub fn schema_references(schema: Node<'_, '_>) -> Vec<SchemaReference> {
    xsd_children(schema)
        .filter_map(|child| {
            let is_include = match child.tag_name().name() {
                "include" | "redefine" => true,
                "import" => false,
                _ => return None,
            };
            match child.attribute("schemaLocation") {
                Some(loc) => Some(SchemaReference { schema_location: loc.to_string(), is_include }),
                None => {
                    debug!("import without schemaLocation; expecting it inline");
                    None
                }
            }
        })
        .collect()
}

/// Walk one schema element. `inherited_ns` is the includer's namespace.
pub fn extract_schema(schema: Node<'_, '_>, inherited_ns: Option<&str>) -> SchemaDocument {
    let target_namespace = schema
        .attribute("targetNamespace")
        .or(inherited_ns)
        .filter(|ns| !ns.is_empty())
        .map(str::to_string);
    let cx = SchemaCx { target_ns: target_namespace.as_deref() };

    let mut doc = SchemaDocument {
        element_form_qualified: schema.attribute("elementFormDefault") == Some("qualified"),
        target_namespace: target_namespace.clone(),
        ..SchemaDocument::default()
    };

    for child in xsd_children(schema) {
        match child.tag_name().name() {
            "element" => doc.elements.push(cx.element(child)),
            "attribute" => doc.attributes.push(cx.attribute(child)),
            "group" => doc.groups.push(cx.group(child)),
            "complexType" => doc.data_types.push(cx.complex_type(child)),
            "simpleType" => doc.data_types.push(cx.simple_type(child)),
            "import" | "include" | "redefine" | "annotation" | "notation" => {}
            other => debug!("ignoring top level schema component `{other}`"),
        }
    }
    doc
}

#[derive(Clone, Copy)]
struct SchemaCx<'s> {
    target_ns: Option<&'s str>,
}

impl SchemaCx<'_> {
    /// Name declared by this schema, carrying the prefix bound to the target namespace.
    fn declared_name(&self, node: Node<'_, '_>) -> Option<QName> {
        let local = node.attribute("name")?;
        let prefix = self.target_ns.and_then(|ns| node.lookup_prefix(ns));
        Some(QName::new(self.target_ns, local).with_prefix(prefix))
    }

    fn element(&self, node: Node<'_, '_>) -> Element {
        let max_occurs = node.attribute("maxOccurs").unwrap_or("1");
        let is_array = max_occurs == "unbounded" || max_occurs.parse::<u64>().is_ok_and(|n| n > 1);
        let min_occurs = node.attribute("minOccurs").and_then(|v| v.parse().ok()).unwrap_or(1);

        let mut element = Element {
            name: self.declared_name(node),
            is_array,
            min_occurs,
            ..Element::default()
        };
        if let Some(ty) = node.attribute("type") {
            element.type_ref = Some(resolve_qname(node, ty));
        } else if let Some(inline) = self.inline_type(node) {
            element.inline_type = Some(Box::new(inline));
        } else if let Some(r) = node.attribute("ref") {
            element.ref_key = Some(resolve_qname(node, r));
        } else {
            warn!(
                "data type for element `{}` could not be determined",
                node.attribute("name").unwrap_or("?")
            );
        }
        element
    }

    fn attribute(&self, node: Node<'_, '_>) -> Attribute {
        let mut attribute = Attribute {
            name: self.declared_name(node),
            required: node.attribute("use") == Some("required"),
            ..Attribute::default()
        };
        if let Some(ty) = node.attribute("type") {
            attribute.type_ref = Some(resolve_qname(node, ty));
        } else if let Some(inline) = self.inline_type(node) {
            attribute.inline_type = Some(Box::new(inline));
        } else if let Some(r) = node.attribute("ref") {
            attribute.ref_key = Some(resolve_qname(node, r));
        } else {
            // untyped attributes are anySimpleType
            attribute.type_ref = Some(QName::new(Some(XSD_NS), "string"));
        }
        attribute
    }

    fn inline_type(&self, node: Node<'_, '_>) -> Option<DataType> {
        xsd_children(node).find_map(|child| match child.tag_name().name() {
            "complexType" => Some(self.complex_type(child)),
            "simpleType" => Some(self.simple_type(child)),
            _ => None,
        })
    }

    fn complex_type(&self, node: Node<'_, '_>) -> DataType {
        let mut dt = DataType { name: self.declared_name(node), ..DataType::default() };
        self.content_into(node, &mut dt);
        dt
    }

    /// Particles and attributes of a complex type (or of its derivation step).
    fn content_into(&self, node: Node<'_, '_>, dt: &mut DataType) {
        for child in xsd_children(node) {
            match child.tag_name().name() {
                "sequence" | "all" => dt.sequence = Some(self.sequence(child)),
                "choice" => dt.choice = Some(self.choice(child)),
                "group" => dt.group = Some(self.group(child)),
                "attribute" => dt.attributes.push(self.attribute(child)),
                "simpleContent" | "complexContent" => {
                    let simple = child.tag_name().name() == "simpleContent";
                    for derivation in xsd_children(child) {
                        let kind = derivation.tag_name().name();
                        if kind != "extension" && kind != "restriction" {
                            continue;
                        }
                        let base = derivation.attribute("base").map(|b| resolve_qname(derivation, b));
                        if kind == "extension" || simple {
                            dt.extension_base = base;
                            dt.simple_content = simple;
                        }
                        self.content_into(derivation, dt);
                    }
                }
                "attributeGroup" | "anyAttribute" | "annotation" => {}
                other => debug!("ignoring `{other}` inside complexType"),
            }
        }
    }

    fn simple_type(&self, node: Node<'_, '_>) -> DataType {
        let base = xsd_children(node).find_map(|child| match child.tag_name().name() {
            "restriction" => Some(
                child
                    .attribute("base")
                    .map(|b| resolve_qname(child, b))
                    .or_else(|| {
                        xsd_children(child)
                            .find(|n| is_xsd(n, "simpleType"))
                            .and_then(|n| self.simple_type(n).restriction_base)
                    })
                    .unwrap_or_else(|| QName::new(Some(XSD_NS), "string")),
            ),
            // lists and unions travel as text
            "list" | "union" => Some(QName::new(Some(XSD_NS), "string")),
            _ => None,
        });
        DataType {
            name: self.declared_name(node),
            restriction_base: Some(base.unwrap_or_else(|| QName::new(Some(XSD_NS), "string"))),
            ..DataType::default()
        }
    }

    fn sequence(&self, node: Node<'_, '_>) -> Sequence {
        let mut seq = Sequence::default();
        for child in xsd_children(node) {
            match child.tag_name().name() {
                "element" => seq.elements.push(self.element(child)),
                "sequence" | "all" => seq.sequences.push(self.sequence(child)),
                "choice" => seq.choices.push(self.choice(child)),
                "group" => seq.groups.push(self.group(child)),
                _ => {}
            }
        }
        seq
    }

    fn choice(&self, node: Node<'_, '_>) -> Choice {
        let mut choice = Choice::default();
        for child in xsd_children(node) {
            match child.tag_name().name() {
                "element" => choice.elements.push(self.element(child)),
                "sequence" | "all" => choice.sequences.push(self.sequence(child)),
                "choice" => choice.choices.push(self.choice(child)),
                "group" => choice.groups.push(self.group(child)),
                _ => {}
            }
        }
        choice
    }

    /// Both `<group name=…>` definitions and `<group ref=…/>` uses.
    fn group(&self, node: Node<'_, '_>) -> Group {
        let mut group = Group {
            name: self.declared_name(node),
            ref_key: node.attribute("ref").map(|r| resolve_qname(node, r)),
            ..Group::default()
        };
        for child in xsd_children(node) {
            match child.tag_name().name() {
                "sequence" | "all" => group.sequences.push(self.sequence(child)),
                "choice" => group.choices.push(self.choice(child)),
                _ => {}
            }
        }
        group
    }
}

/// `prefix:local` → QName, resolving the prefix in scope at `node`.
pub fn resolve_qname(node: Node<'_, '_>, raw: &str) -> QName {
    let raw = raw.trim();
    let (prefix, local) = match raw.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, raw),
    };
    let namespace = node.lookup_namespace_uri(prefix);
    QName::new(namespace, local).with_prefix(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    fn with_schema<T>(xml: &str, f: impl FnOnce(Node<'_, '_>) -> T) -> T {
        let doc = Document::parse(xml).unwrap();
        f(doc.root_element())
    }

    #[test]
    fn extracts_types_elements_and_qualification() {
        let xml = r#"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:tns="urn:shop"
           targetNamespace="urn:shop" elementFormDefault="qualified">
  <xs:element name="order" type="tns:Order"/>
  <xs:complexType name="Order">
    <xs:sequence>
      <xs:element name="id" type="xs:int"/>
      <xs:element name="line" type="tns:Line" maxOccurs="unbounded" minOccurs="0"/>
      <xs:choice>
        <xs:element name="email" type="xs:string"/>
      </xs:choice>
    </xs:sequence>
    <xs:attribute name="currency" type="xs:string" use="required"/>
  </xs:complexType>
  <xs:simpleType name="Colour">
    <xs:restriction base="xs:string"><xs:enumeration value="red"/></xs:restriction>
  </xs:simpleType>
</xs:schema>"#;
        let doc = with_schema(xml, |n| extract_schema(n, None));
        assert!(doc.element_form_qualified);
        assert_eq!(doc.target_namespace.as_deref(), Some("urn:shop"));
        assert_eq!(doc.elements.len(), 1);
        assert_eq!(doc.elements[0].type_ref.as_ref().unwrap().local, "Order");
        assert_eq!(doc.elements[0].type_ref.as_ref().unwrap().namespace.as_deref(), Some("urn:shop"));

        let order = &doc.data_types[0];
        assert_eq!(order.name.as_ref().unwrap().prefix.as_deref(), Some("tns"));
        let seq = order.sequence.as_ref().unwrap();
        assert_eq!(seq.elements.len(), 2);
        assert!(seq.elements[1].is_array);
        assert_eq!(seq.elements[1].min_occurs, 0);
        assert_eq!(seq.choices[0].elements[0].name.as_ref().unwrap().local, "email");
        assert!(order.attributes[0].required);

        let colour = &doc.data_types[1];
        assert_eq!(colour.restriction_base.as_ref().unwrap().local, "string");
    }

    #[test]
    fn extensions_and_group_refs() {
        let xml = r#"
<schema xmlns="http://www.w3.org/2001/XMLSchema" xmlns:t="urn:t" targetNamespace="urn:t">
  <group name="Audit"><sequence><element name="by" type="string"/></sequence></group>
  <complexType name="Manager">
    <complexContent>
      <extension base="t:Employee">
        <sequence><element name="reports" type="int"/></sequence>
      </extension>
    </complexContent>
  </complexType>
  <complexType name="Price">
    <simpleContent><extension base="decimal"><attribute name="cur" type="string"/></extension></simpleContent>
  </complexType>
  <complexType name="Audited"><group ref="t:Audit"/></complexType>
  <element name="inline"><complexType><sequence><element ref="t:other"/></sequence></complexType></element>
</schema>"#;
        let doc = with_schema(xml, |n| extract_schema(n, None));
        assert!(!doc.element_form_qualified);
        assert_eq!(doc.groups[0].name.as_ref().unwrap().local, "Audit");

        let manager = &doc.data_types[0];
        assert_eq!(manager.extension_base.as_ref().unwrap().local, "Employee");
        assert!(!manager.simple_content);
        assert_eq!(manager.sequence.as_ref().unwrap().elements[0].name.as_ref().unwrap().local, "reports");

        let price = &doc.data_types[1];
        assert!(price.simple_content);
        assert_eq!(price.extension_base.as_ref().unwrap().namespace.as_deref(), Some(XSD_NS));
        assert_eq!(price.attributes.len(), 1);

        let audited = &doc.data_types[2];
        assert_eq!(audited.group.as_ref().unwrap().ref_key.as_ref().unwrap().local, "Audit");

        let inline = doc.elements[0].inline_type.as_ref().unwrap();
        let inner = &inline.sequence.as_ref().unwrap().elements[0];
        assert_eq!(inner.ref_key.as_ref().unwrap().local, "other");
    }

    #[test]
    fn includes_inherit_namespace_and_references_are_listed() {
        let xml = r#"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:include schemaLocation="common.xsd"/>
  <xs:import namespace="urn:x" schemaLocation="../x.xsd"/>
  <xs:import namespace="urn:y"/>
</xs:schema>"#;
        with_schema(xml, |n| {
            let refs = schema_references(n);
            assert_eq!(refs.len(), 2);
            assert!(refs[0].is_include);
            assert_eq!(refs[1].schema_location, "../x.xsd");
            let doc = extract_schema(n, Some("urn:parent"));
            assert_eq!(doc.target_namespace.as_deref(), Some("urn:parent"));
        });
    }
}
