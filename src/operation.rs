//! SOAP binding operation → REST operation.
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::config::ConvertConfig;
use crate::lower::{lower_type_ref, strip_whitespace};
use crate::openapi::{HttpVerb, OperationDescriptor, Schema, SoapVersion, ROOT_ELEMENT_PREFIX};
use crate::wsdl::{MessagePart, WsdlInfo, WsdlOperation};

/// Property holding a type-based message part.
pub const TYPE_PART_PROPERTY: &str = "parameter";

/// `/` + name with whitespace removed and the first character lower-cased.
pub fn resource_path(operation_name: &str) -> String {
    let compact = strip_whitespace(operation_name);
    let mut chars = compact.chars();
    match chars.next() {
        Some(first) => format!("/{}{}", first.to_lowercase(), chars.as_str()),
        None => "/".to_string(),
    }
}

/// Request/response body schema for a list of message parts.
pub fn body_schema(parts: &[MessagePart]) -> Schema {
    let mut body = Schema::object("");
    for part in parts {
        match part {
            MessagePart::Type(ty) => {
                if body.properties.contains_key(TYPE_PART_PROPERTY) {
                    debug!("several type based parts; `{ty}` replaces the previous `{TYPE_PART_PROPERTY}`");
                }
                body.add_property(TYPE_PART_PROPERTY, lower_type_ref(ty).named(TYPE_PART_PROPERTY), false);
            }
            MessagePart::Element(el) => {
                let local = strip_whitespace(&el.local);
                let target = format!("{ROOT_ELEMENT_PREFIX}{local}");
                body.add_property(local.clone(), Schema::reference(target).named(local), false);
            }
        }
    }
    body
}

pub fn build_operation(
    op: &WsdlOperation,
    soap_version: SoapVersion,
    config: &ConvertConfig,
) -> OperationDescriptor {
    let path = resource_path(&op.name);
    debug!("REST resource path for SOAP operation `{}` is `{path}`", op.name);

    let (http_verb, query_parameters) = match config.operation(&op.name) {
        Some(ov) => {
            if ov.method == HttpVerb::Post && !ov.query.is_empty() {
                warn!("query parameters of POST operation `{}` are ignored", op.name);
                (HttpVerb::Post, IndexMap::new())
            } else {
                (ov.method, ov.query.clone())
            }
        }
        None => (HttpVerb::Post, IndexMap::new()),
    };

    OperationDescriptor {
        operation_id: op.name.clone(),
        resource_path: path,
        http_verb,
        input: body_schema(&op.input),
        output: body_schema(&op.output),
        soap_action: op.soap_action.clone(),
        target_namespace: op.target_namespace.clone(),
        soap_version,
        style: op.style,
        message_type: op.message_type,
        query_parameters,
    }
}

/// Resource path -> operation, later operations overwriting earlier ones.
pub fn build_operations(
    info: &WsdlInfo,
    config: &ConvertConfig,
) -> IndexMap<String, OperationDescriptor> {
    if info.operations.is_empty() {
        info!("no SOAP operations found in the WSDL");
    }
    let version = info.soap_version();
    let mut paths = IndexMap::new();
    for op in &info.operations {
        let descriptor = build_operation(op, version, config);
        if let Some(previous) = paths.insert(descriptor.resource_path.clone(), descriptor) {
            debug!("operation `{}` overwritten at the same resource path", previous.operation_id);
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperationOverride;
    use crate::openapi::{MessageStyle, SchemaKind};
    use crate::xsd::QName;
    use rstest::rstest;

    fn op(name: &str, input: Vec<MessagePart>) -> WsdlOperation {
        WsdlOperation {
            name: name.into(),
            soap_action: format!("urn:{name}"),
            style: MessageStyle::Document,
            target_namespace: "urn:svc".into(),
            message_type: None,
            input,
            output: vec![],
        }
    }

    #[rstest]
    #[case("GetUser", "/getUser")]
    #[case("Get User", "/getUser")]
    #[case("  add\tItem ", "/addItem")]
    #[case("x", "/x")]
    #[case("Ärger", "/ärger")]
    fn resource_paths(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(resource_path(name), expected);
    }

    #[test]
    fn body_schema_uses_parameter_and_root_element_refs() {
        let body = body_schema(&[
            MessagePart::Type(QName::local("int")),
            MessagePart::Type(QName::local("string")),
            MessagePart::Element(QName::new(Some("urn:svc"), "getInfo")),
        ]);
        assert_eq!(body.properties.len(), 2);
        assert_eq!(body.properties[TYPE_PART_PROPERTY].kind, SchemaKind::String);
        assert_eq!(body.properties["getInfo"].ref_target.as_deref(), Some("rootElement_getInfo"));
        assert!(body_schema(&[]).properties.is_empty());
    }

    #[test]
    fn overrides_switch_to_get_with_query() {
        let mut config = ConvertConfig::default();
        let mut query = IndexMap::new();
        query.insert("id".to_string(), "string".to_string());
        config.operations.insert("GetUser".into(), OperationOverride { method: HttpVerb::Get, query });

        let get = build_operation(&op("GetUser", vec![]), SoapVersion::V11, &config);
        assert_eq!(get.http_verb, HttpVerb::Get);
        assert_eq!(get.query_parameters["id"], "string");
        assert_eq!(get.operation_id, "GetUser");

        let post = build_operation(&op("Other", vec![]), SoapVersion::V12, &config);
        assert_eq!(post.http_verb, HttpVerb::Post);
        assert!(post.query_parameters.is_empty());
        assert_eq!(post.soap_version, SoapVersion::V12);
    }

    #[test]
    fn colliding_paths_keep_the_later_operation() {
        let info = WsdlInfo {
            operations: vec![op("GetUser", vec![]), op("Get User", vec![])],
            ..WsdlInfo::default()
        };
        let paths = build_operations(&info, &ConvertConfig::default());
        assert_eq!(paths.len(), 1);
        assert_eq!(paths["/getUser"].operation_id, "Get User");
    }
}
