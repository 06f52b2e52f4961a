//! SOAP (WSDL 1.1 + XSD) to REST: OpenAPI 3.0 documents plus the SOAP request
//! templates a gateway needs to turn REST payloads back into SOAP bodies.
pub mod config;
pub mod convert;
pub mod error;
pub mod example;
pub mod lower;
pub mod openapi;
pub mod operation;
pub mod paths;
pub mod template;
pub mod wsdl;
pub mod xsd;

pub use config::ConvertConfig;
pub use convert::{ConversionData, Converter, SoapRequestElement};
pub use error::ConversionError;
pub use wsdl::Location;
