//! WSDL 1.1 reading: document loading, SOAP operation extraction and the
//! embedded/imported XML schemas.
pub mod loader;
pub mod schema;

use std::collections::HashSet;

use indexmap::IndexMap;
use roxmltree::Node;
use tracing::{debug, warn};

use crate::error::{ConversionError, SchemaError};
use crate::openapi::{MessageStyle, SoapVersion};
use crate::xsd::{QName, TypeGraph};

pub use loader::{DefaultLoader, Location, ResourceLoader, parse_xml};

pub const WSDL_NS: &str = "http://schemas.xmlsoap.org/wsdl/";
pub const SOAP11_BINDING_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const SOAP12_BINDING_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";
pub const WSDL_VERSION_11: &str = "1.1";

/// A message part is typed either by a global element or by a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    Element(QName),
    Type(QName),
}

#[derive(Debug, Clone)]
pub struct WsdlOperation {
    pub name: String,
    pub soap_action: String,
    pub style: MessageStyle,
    pub target_namespace: String,
    pub input: Vec<MessagePart>,
    pub output: Vec<MessagePart>,
    pub message_type: Option<MessageStyle>,
}

#[derive(Debug, Clone, Default)]
pub struct WsdlInfo {
    pub version: String,
    pub target_namespace: String,
    pub operations: Vec<WsdlOperation>,
    pub soap_service: String,
    pub soap_port: String,
    pub has_soap11_binding: bool,
    pub has_soap12_binding: bool,
}

impl WsdlInfo {
    pub fn soap_version(&self) -> SoapVersion {
        if self.has_soap12_binding { SoapVersion::V12 } else { SoapVersion::V11 }
    }
}

/// Everything one conversion needs from the WSDL.
#[derive(Debug, Clone)]
pub struct WsdlDocument {
    pub location: Location,
    pub info: WsdlInfo,
    pub types: TypeGraph,
}

/// Load and extract a WSDL plus every schema it references.
pub fn read_wsdl(
    loader: &dyn ResourceLoader,
    location: &Location,
) -> Result<WsdlDocument, ConversionError> {
    let read_err = |source| ConversionError::ReadWsdl { location: location.clone(), source };
    let process_err = |source| ConversionError::ProcessWsdl { location: location.clone(), source };

    let text = loader.load(location).map_err(read_err)?;
    let doc = parse_xml(&text, location).map_err(read_err)?;
    let definitions = doc.root_element();
    if !is_wsdl(&definitions, "definitions") {
        return Err(process_err(SchemaError::NotWsdl(location.to_string())));
    }

    let info = extract_info(definitions).map_err(process_err)?;

    let mut types = TypeGraph::default();
    let mut visited = HashSet::from([location.clone()]);
    for schema_node in wsdl_children(definitions, "types").flat_map(|t| t.children()) {
        if !schema::is_xsd(&schema_node, "schema") {
            continue;
        }
        types.documents.push(schema::extract_schema(schema_node, None));
        let ns = schema_node.attribute("targetNamespace");
        follow_references(loader, location, schema_node, ns, &mut visited, &mut types)
            .map_err(process_err)?;
    }

    debug!(
        "read {location}: {} operations, {} schema documents",
        info.operations.len(),
        types.documents.len()
    );
    Ok(WsdlDocument { location: location.clone(), info, types })
}

fn follow_references(
    loader: &dyn ResourceLoader,
    base: &Location,
    schema_node: Node<'_, '_>,
    schema_ns: Option<&str>,
    visited: &mut HashSet<Location>,
    types: &mut TypeGraph,
) -> Result<(), SchemaError> {
    for reference in schema::schema_references(schema_node) {
        let load_err = |source| SchemaError::Load { location: reference.schema_location.clone(), source };
        let target = base.resolve(&reference.schema_location).map_err(load_err)?;
        if !visited.insert(target.clone()) {
            continue;
        }
        let text = loader.load(&target).map_err(load_err)?;
        let doc = parse_xml(&text, &target).map_err(load_err)?;
        let root = doc.root_element();
        if !schema::is_xsd(&root, "schema") {
            warn!("`{target}` is not an XML schema; ignoring it");
            continue;
        }
        let inherited = if reference.is_include { schema_ns } else { None };
        types.documents.push(schema::extract_schema(root, inherited));
        let ns = root.attribute("targetNamespace").or(inherited);
        follow_references(loader, &target, root, ns, visited, types)?;
    }
    Ok(())
}

fn is_wsdl(node: &Node<'_, '_>, local: &str) -> bool {
    node.is_element() && node.tag_name().name() == local && node.tag_name().namespace() == Some(WSDL_NS)
}

fn wsdl_children<'a, 'input>(
    node: Node<'a, 'input>,
    local: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |n| is_wsdl(n, local))
}

fn soap_child<'a, 'input>(node: Node<'a, 'input>, local: &str) -> Option<(Node<'a, 'input>, SoapVersion)> {
    node.children().find_map(|n| {
        if !n.is_element() || n.tag_name().name() != local {
            return None;
        }
        match n.tag_name().namespace() {
            Some(SOAP11_BINDING_NS) => Some((n, SoapVersion::V11)),
            Some(SOAP12_BINDING_NS) => Some((n, SoapVersion::V12)),
            _ => None,
        }
    })
}

fn local_of(node: Node<'_, '_>, attr: &str) -> Option<String> {
    node.attribute(attr)
        .map(|raw| schema::resolve_qname(node, raw).local)
}

struct PortOperation {
    input: Option<String>,
    output: Option<String>,
}

fn extract_info(definitions: Node<'_, '_>) -> Result<WsdlInfo, SchemaError> {
    let target_namespace = definitions.attribute("targetNamespace").unwrap_or_default().to_string();

    let mut messages: IndexMap<String, Vec<MessagePart>> = IndexMap::new();
    for message in wsdl_children(definitions, "message") {
        let Some(name) = message.attribute("name") else { continue };
        let parts = wsdl_children(message, "part")
            .filter_map(|part| {
                if let Some(el) = part.attribute("element") {
                    Some(MessagePart::Element(schema::resolve_qname(part, el)))
                } else if let Some(ty) = part.attribute("type") {
                    Some(MessagePart::Type(schema::resolve_qname(part, ty)))
                } else {
                    warn!("part `{}` of message `{name}` has no element or type", part.attribute("name").unwrap_or("?"));
                    None
                }
            })
            .collect();
        messages.insert(name.to_string(), parts);
    }

    let mut port_types: IndexMap<String, IndexMap<String, PortOperation>> = IndexMap::new();
    for port_type in wsdl_children(definitions, "portType") {
        let Some(name) = port_type.attribute("name") else { continue };
        let ops = wsdl_children(port_type, "operation")
            .filter_map(|op| {
                let op_name = op.attribute("name")?;
                let message_of = |dir: &'static str| {
                    wsdl_children(op, dir).next().and_then(|n| local_of(n, "message"))
                };
                Some((op_name.to_string(), PortOperation { input: message_of("input"), output: message_of("output") }))
            })
            .collect();
        port_types.insert(name.to_string(), ops);
    }

    let parts_of = |message: &Option<String>| -> Vec<MessagePart> {
        match message {
            Some(m) => messages.get(m).cloned().unwrap_or_else(|| {
                warn!("message `{m}` is referenced but never defined");
                Vec::new()
            }),
            None => Vec::new(),
        }
    };

    let mut info = WsdlInfo {
        version: WSDL_VERSION_11.to_string(),
        target_namespace: target_namespace.clone(),
        ..WsdlInfo::default()
    };
    let mut seen = HashSet::new();

    for binding in wsdl_children(definitions, "binding") {
        let binding_name = binding.attribute("name").unwrap_or_default();
        let Some((soap_binding, version)) = soap_child(binding, "binding") else {
            warn!("binding `{binding_name}` has no SOAP binding; skipping it");
            continue;
        };
        match version {
            SoapVersion::V11 => info.has_soap11_binding = true,
            SoapVersion::V12 => info.has_soap12_binding = true,
        }
        let binding_style = soap_binding.attribute("style").and_then(MessageStyle::parse);
        let port_ops = local_of(binding, "type").and_then(|pt| port_types.get(&pt));

        for op in wsdl_children(binding, "operation") {
            let Some(name) = op.attribute("name") else { continue };
            if !seen.insert(name.to_string()) {
                debug!("operation `{name}` already taken from another binding");
                continue;
            }
            let soap_op = soap_child(op, "operation").map(|(n, _)| n);
            let soap_action = soap_op.and_then(|n| n.attribute("soapAction")).unwrap_or_default();
            let style = soap_op
                .and_then(|n| n.attribute("style"))
                .and_then(MessageStyle::parse)
                .or(binding_style)
                .unwrap_or(MessageStyle::Document);

            let port_op = port_ops.and_then(|ops| ops.get(name));
            if port_op.is_none() {
                warn!("operation `{name}` of binding `{binding_name}` is missing from its port type");
            }
            let input = port_op.map(|p| parts_of(&p.input)).unwrap_or_default();
            let output = port_op.map(|p| parts_of(&p.output)).unwrap_or_default();

            let op_namespace = input
                .iter()
                .find_map(|p| match p {
                    MessagePart::Element(q) => q.namespace.clone(),
                    MessagePart::Type(_) => None,
                })
                .unwrap_or_else(|| target_namespace.clone());

            info.operations.push(WsdlOperation {
                name: name.to_string(),
                soap_action: soap_action.to_string(),
                style,
                target_namespace: op_namespace,
                message_type: message_type(&input),
                input,
                output,
            });
        }
    }

    let service = wsdl_children(definitions, "service").next().ok_or(SchemaError::MissingService)?;
    let port = wsdl_children(service, "port").next().ok_or(SchemaError::MissingService)?;
    info.soap_service = service.attribute("name").unwrap_or_default().to_string();
    info.soap_port = port.attribute("name").unwrap_or_default().to_string();

    Ok(info)
}

/// `rpc` if any input part is type based, `document` if element based.
fn message_type(input: &[MessagePart]) -> Option<MessageStyle> {
    if input.iter().any(|p| matches!(p, MessagePart::Type(_))) {
        Some(MessageStyle::Rpc)
    } else if input.is_empty() {
        None
    } else {
        Some(MessageStyle::Document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use std::collections::HashMap;

    /// In-memory documents keyed by their display location.
    struct MapLoader(HashMap<String, &'static str>);

    impl ResourceLoader for MapLoader {
        fn load(&self, location: &Location) -> Result<String, LoadError> {
            self.0.get(&location.to_string()).map(|s| s.to_string()).ok_or_else(|| LoadError::Io {
                path: location.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }
    }

    const RPC_WSDL: &str = r#"<?xml version="1.0"?>
<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
             xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
             xmlns:soap12="http://schemas.xmlsoap.org/wsdl/soap12/"
             xmlns:xsd="http://www.w3.org/2001/XMLSchema"
             xmlns:tns="urn:calc" targetNamespace="urn:calc">
  <types>
    <xsd:schema targetNamespace="urn:calc">
      <xsd:include schemaLocation="common.xsd"/>
      <xsd:import namespace="urn:other" schemaLocation="./common.xsd"/>
    </xsd:schema>
  </types>
  <message name="AddRequest"><part name="a" type="xsd:int"/><part name="b" type="xsd:int"/></message>
  <message name="AddResponse"><part name="sum" type="xsd:int"/></message>
  <message name="PingRequest"/>
  <portType name="CalcPort">
    <operation name="Add"><input message="tns:AddRequest"/><output message="tns:AddResponse"/></operation>
    <operation name="Ping"><input message="tns:PingRequest"/></operation>
  </portType>
  <binding name="CalcHttp" type="tns:CalcPort"><operation name="Add"/></binding>
  <binding name="CalcSoap" type="tns:CalcPort">
    <soap:binding style="rpc" transport="http://schemas.xmlsoap.org/soap/http"/>
    <operation name="Add"><soap:operation soapAction="urn:calc#Add"/></operation>
    <operation name="Ping"><soap:operation style="document"/></operation>
  </binding>
  <binding name="CalcSoap12" type="tns:CalcPort">
    <soap12:binding style="rpc" transport="http://schemas.xmlsoap.org/soap/http"/>
    <operation name="Add"><soap12:operation soapAction="urn:calc#Add"/></operation>
  </binding>
  <service name="Calculator"><port name="CalcSoapPort" binding="tns:CalcSoap"/></service>
</definitions>"#;

    const COMMON_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="Shared"><xs:sequence><xs:element name="x" type="xs:string"/></xs:sequence></xs:complexType>
</xs:schema>"#;

    fn loader() -> MapLoader {
        MapLoader(HashMap::from([("calc.wsdl".to_string(), RPC_WSDL), ("common.xsd".to_string(), COMMON_XSD)]))
    }

    #[test]
    fn operations_styles_and_versions() {
        let wsdl = read_wsdl(&loader(), &Location::parse("calc.wsdl")).unwrap();
        let info = &wsdl.info;
        assert_eq!(info.version, "1.1");
        assert_eq!(info.soap_service, "Calculator");
        assert_eq!(info.soap_port, "CalcSoapPort");
        assert!(info.has_soap11_binding && info.has_soap12_binding);
        assert_eq!(info.soap_version(), SoapVersion::V12);

        assert_eq!(info.operations.len(), 2);
        let add = &info.operations[0];
        assert_eq!(add.soap_action, "urn:calc#Add");
        assert_eq!(add.style, MessageStyle::Rpc);
        assert_eq!(add.message_type, Some(MessageStyle::Rpc));
        assert_eq!(add.target_namespace, "urn:calc");
        assert_eq!(add.input.len(), 2);

        let ping = &info.operations[1];
        assert_eq!(ping.style, MessageStyle::Document);
        assert_eq!(ping.soap_action, "");
        assert_eq!(ping.message_type, None);
    }

    #[test]
    fn schemas_are_loaded_once_and_includes_inherit_namespace() {
        let wsdl = read_wsdl(&loader(), &Location::parse("calc.wsdl")).unwrap();
        assert_eq!(wsdl.types.documents.len(), 2);
        assert_eq!(wsdl.types.documents[1].target_namespace.as_deref(), Some("urn:calc"));
    }

    #[test]
    fn missing_document_and_missing_include_map_to_distinct_errors() {
        let err = read_wsdl(&loader(), &Location::parse("nope.wsdl")).unwrap_err();
        assert!(err.is_read_error());

        let only_wsdl = MapLoader(HashMap::from([("calc.wsdl".to_string(), RPC_WSDL)]));
        let err = read_wsdl(&only_wsdl, &Location::parse("calc.wsdl")).unwrap_err();
        assert!(err.is_process_error());
    }

    #[test]
    fn message_type_rules() {
        let el = MessagePart::Element(QName::local("e"));
        let ty = MessagePart::Type(QName::local("t"));
        assert_eq!(message_type(&[]), None);
        assert_eq!(message_type(std::slice::from_ref(&el)), Some(MessageStyle::Document));
        assert_eq!(message_type(&[el, ty]), Some(MessageStyle::Rpc));
    }
}
