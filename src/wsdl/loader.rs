//! Where documents come from, and how they are fetched and parsed.
use std::fmt;
use std::path::{Component, Path, PathBuf};

use roxmltree::{Document, ParsingOptions};
use tracing::debug;

use crate::error::LoadError;

/// A document location: local file or `http(s)` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    File(PathBuf),
    Url(reqwest::Url),
}

impl Location {
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            if let Ok(url) = reqwest::Url::parse(raw) {
                return Location::Url(url);
            }
        }
        Location::File(normalize(Path::new(raw)))
    }

    /// Resolve `reference` (e.g. a `schemaLocation`) against this document.
    pub fn resolve(&self, reference: &str) -> Result<Location, LoadError> {
        let reference = reference.trim();
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Ok(Location::parse(reference));
        }
        match self {
            Location::Url(base) => base.join(reference).map(Location::Url).map_err(|_| {
                LoadError::Resolve { base: self.to_string(), reference: reference.to_string() }
            }),
            Location::File(path) => {
                let dir = path.parent().unwrap_or(Path::new("."));
                Ok(Location::File(normalize(&dir.join(reference))))
            }
        }
    }

    /// Last path segment, used as a default title.
    pub fn file_stem(&self) -> Option<String> {
        match self {
            Location::File(path) => path.file_stem().map(|s| s.to_string_lossy().into_owned()),
            Location::Url(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(|s| s.split('.').next().unwrap_or(s).to_string()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Lexical `.`/`..` folding so one file reached two ways is loaded once.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Source of raw document text.
pub trait ResourceLoader: Send + Sync {
    fn load(&self, location: &Location) -> Result<String, LoadError>;
}

/// Reads files from disk and fetches URLs with a blocking HTTP client.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLoader;

impl ResourceLoader for DefaultLoader {
    fn load(&self, location: &Location) -> Result<String, LoadError> {
        debug!("loading {location}");
        match location {
            Location::File(path) => std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                path: path.display().to_string(),
                source,
            }),
            Location::Url(url) => {
                let http = |source| LoadError::Http { url: url.to_string(), source };
                reqwest::blocking::get(url.clone())
                    .and_then(|resp| resp.error_for_status())
                    .and_then(|resp| resp.text())
                    .map_err(http)
            }
        }
    }
}

/// Parse with DTDs rejected, so no external entity is ever expanded.
pub fn parse_xml<'input>(
    text: &'input str,
    location: &Location,
) -> Result<Document<'input>, LoadError> {
    let options = ParsingOptions { allow_dtd: false, ..ParsingOptions::default() };
    Document::parse_with_options(text, options).map_err(|source| LoadError::Xml {
        location: location.to_string(),
        source,
    })
}
