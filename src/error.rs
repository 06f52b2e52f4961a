use thiserror::Error;

use crate::wsdl::Location;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read file `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot fetch `{url}`: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("`{location}` is not well-formed XML: {source}")]
    Xml {
        location: String,
        #[source]
        source: roxmltree::Error,
    },
    #[error("cannot resolve `{reference}` against `{base}`")]
    Resolve { base: String, reference: String },
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("cannot load schema `{location}`: {source}")]
    Load {
        location: String,
        #[source]
        source: LoadError,
    },
    #[error("no SOAP service/port defined")]
    MissingService,
    #[error("`{0}` is not a WSDL 1.1 definitions document")]
    NotWsdl(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExampleError {
    #[error("schema `{0}` is a reference without a target")]
    MissingTarget(String),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid JSON path `{0}`")]
    InvalidPath(String),
    #[error("cannot render template: {0}")]
    Render(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config at JSON path {path} → {message}")]
    Invalid { path: String, message: String },
}

/// Top-level failure of one WSDL conversion.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("cannot read WSDL document `{location}`: {source}")]
    ReadWsdl {
        location: Location,
        #[source]
        source: LoadError,
    },
    #[error("cannot process WSDL document `{location}`: {source}")]
    ProcessWsdl {
        location: Location,
        #[source]
        source: SchemaError,
    },
    #[error("cannot generate example for operation `{operation}`: {source}")]
    Example {
        operation: String,
        #[source]
        source: ExampleError,
    },
    #[error("cannot build template for operation `{operation}`: {source}")]
    Template {
        operation: String,
        #[source]
        source: TemplateError,
    },
}

impl ConversionError {
    pub fn is_read_error(&self) -> bool {
        matches!(self, ConversionError::ReadWsdl { .. })
    }

    pub fn is_process_error(&self) -> bool {
        matches!(self, ConversionError::ProcessWsdl { .. })
    }
}
