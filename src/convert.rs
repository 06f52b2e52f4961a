//! WSDL → OpenAPI + SOAP request templates.
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::config::ConvertConfig;
use crate::error::ConversionError;
use crate::example::ExampleBuilder;
use crate::lower;
use crate::openapi::{OpenApiDocument, OperationDescriptor, SchemaMap};
use crate::operation;
use crate::paths;
use crate::template::{self, TemplateContext};
use crate::wsdl::{self, DefaultLoader, Location, ResourceLoader};

/// What the gateway needs to rebuild one SOAP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapRequestElement {
    /// Rendered XML template.
    pub template: String,
    pub soap_action: String,
    pub namespace: String,
    /// SOAP envelope namespace (1.1 or 1.2).
    pub soap_namespace: String,
}

#[derive(Debug, Clone)]
pub struct ConversionData {
    pub openapi: OpenApiDocument,
    /// operationId -> request template.
    pub request_bodies: IndexMap<String, SoapRequestElement>,
    pub soap_service: String,
    pub soap_port: String,
}

impl ConversionData {
    pub fn openapi_yaml(&self) -> Result<String, serde_yaml::Error> {
        self.openapi.to_yaml_string()
    }

    pub fn openapi_json(&self) -> Result<String, serde_json::Error> {
        self.openapi.to_json_string()
    }
}

/// Owns how documents are loaded and how operations are mapped.
/// Cheap to share between threads; every `convert` call is independent.
pub struct Converter {
    loader: Box<dyn ResourceLoader>,
    config: ConvertConfig,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConvertConfig::default())
    }
}

impl Converter {
    pub fn new(config: ConvertConfig) -> Self {
        Self { loader: Box::new(DefaultLoader), config }
    }

    pub fn with_loader(mut self, loader: impl ResourceLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    pub fn convert(&self, location: &Location) -> Result<ConversionData, ConversionError> {
        let wsdl = wsdl::read_wsdl(self.loader.as_ref(), location)?;

        let schemas = lower::lower(&wsdl.types);
        let operations = operation::build_operations(&wsdl.info, &self.config);
        let title = self
            .config
            .title
            .clone()
            .or_else(|| location.file_stem())
            .unwrap_or_default();
        let openapi = OpenApiDocument {
            title,
            version: self.config.version_or_default().to_string(),
            paths: operations,
            schemas,
        };

        let mut request_bodies = IndexMap::new();
        for op in openapi.operations() {
            let element = request_element(op, &openapi.schemas)?;
            request_bodies.insert(op.operation_id.clone(), element);
        }

        info!(
            "converted {location}: {} operations, {} schemas",
            openapi.paths.len(),
            openapi.schemas.len()
        );
        Ok(ConversionData {
            openapi,
            request_bodies,
            soap_service: wsdl.info.soap_service,
            soap_port: wsdl.info.soap_port,
        })
    }
}

fn request_element(
    op: &OperationDescriptor,
    schemas: &SchemaMap,
) -> Result<SoapRequestElement, ConversionError> {
    let extraction = if op.query_parameters.is_empty() {
        let example = ExampleBuilder::new(schemas).build(&op.input).map_err(|source| {
            ConversionError::Example { operation: op.operation_id.clone(), source }
        })?;
        paths::extract(&example)
    } else {
        paths::Extraction::default()
    };

    let cx = TemplateContext {
        operation_id: &op.operation_id,
        namespace: &op.target_namespace,
        segment_schemas: &extraction.schemas,
        rpc: op.is_rpc(),
    };
    let rendered = template::synthesize(cx, &extraction.paths, &op.query_parameters)
        .render()
        .map_err(|source| ConversionError::Template { operation: op.operation_id.clone(), source })?;
    debug!("template for `{}`:\n{rendered}", op.operation_id);

    Ok(SoapRequestElement {
        template: rendered,
        soap_action: op.soap_action.clone(),
        namespace: op.target_namespace.clone(),
        soap_namespace: op.soap_version.envelope_namespace().to_string(),
    })
}
