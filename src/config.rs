//! Optional JSON conversion settings.
//!
//! ```json
//! { "title": "Calculator", "version": "2.0.0",
//!   "operations": { "GetUser": { "method": "GET", "query": { "id": "string" } } } }
//! ```
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ConfigError;
use crate::openapi::HttpVerb;

pub const DEFAULT_API_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConvertConfig {
    pub title: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub operations: IndexMap<String, OperationOverride>,
}

/// Per-operation REST mapping override, keyed by the binding operation name.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OperationOverride {
    #[serde(default)]
    pub method: HttpVerb,
    /// Query parameter name -> primitive type name.
    #[serde(default)]
    pub query: IndexMap<String, String>,
}

impl ConvertConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        from_str_with_path(&src)
    }

    pub fn operation(&self, name: &str) -> Option<&OperationOverride> {
        self.operations.get(name)
    }

    pub fn version_or_default(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_API_VERSION)
    }
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, ConfigError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(ConfigError::Invalid { path, message: err.into_inner().to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let cfg: ConvertConfig = from_str_with_path(
            r#"{ "title": "Calc", "operations": { "GetUser": { "method": "GET", "query": { "id": "string" } }, "Add": {} } }"#,
        )
        .unwrap();
        assert_eq!(cfg.title.as_deref(), Some("Calc"));
        assert_eq!(cfg.version_or_default(), "1.0.0");
        let get = cfg.operation("GetUser").unwrap();
        assert_eq!(get.method, HttpVerb::Get);
        assert_eq!(get.query["id"], "string");
        assert_eq!(cfg.operation("Add").unwrap().method, HttpVerb::Post);
    }

    #[test]
    fn errors_carry_the_json_path() {
        let err = from_str_with_path::<ConvertConfig>(r#"{ "operations": { "GetUser": { "method": "PUT" } } }"#)
            .unwrap_err();
        match err {
            ConfigError::Invalid { path, .. } => assert_eq!(path, "operations.GetUser.method"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{ "version": "3.1.4" }"#).unwrap();
        let cfg = ConvertConfig::load(file.path()).unwrap();
        assert_eq!(cfg.version_or_default(), "3.1.4");
        assert!(ConvertConfig::load(Path::new("/no/such/config.json")).is_err());
    }
}
