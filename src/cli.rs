//! CLI: WSDL → (openapi | templates), plus a JSON path lister.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;

use soap2rest::config::ConvertConfig;
use soap2rest::{ConversionData, Converter, Location};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// convert SOAP services (WSDL 1.1) into OpenAPI documents and SOAP request templates
#[derive(Parser, Debug)]
#[command(name = "soap2rest", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// emit the OpenAPI 3.0 document of each WSDL
    Openapi(OpenApiOut),
    /// emit one SOAP request template per operation
    Templates(TemplatesOut),
    /// list the JSON paths of example payloads
    Paths(PathsOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more WSDL inputs. May be literal paths, quoted glob patterns or http(s) URLs
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// JSON config with title, version and per-operation overrides
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct OpenApiOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// API title (defaults to the config title, then the WSDL file name)
    #[arg(long)]
    title: Option<String>,

    /// API version (defaults to the config version, then 1.0.0)
    #[arg(long)]
    api_version: Option<String>,

    /// emit JSON instead of YAML
    #[arg(long, default_value_t = false)]
    json: bool,

    /// output file; a directory when several inputs are given (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct TemplatesOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output directory, one `<operationId>.xml` per operation (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct PathsOut {
    /// One or more JSON files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn converter(&self, title: Option<&String>, version: Option<&String>) -> Result<Converter> {
        let mut config = match &self.config {
            Some(path) => ConvertConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ConvertConfig::default(),
        };
        if let Some(title) = title {
            config.title = Some(title.clone());
        }
        if let Some(version) = version {
            config.version = Some(version.clone());
        }
        Ok(Converter::new(config))
    }

    fn locations(&self) -> Result<Vec<Location>> {
        let (urls, files): (Vec<&String>, Vec<&String>) =
            self.input.iter().partition(|raw| is_url(raw));
        let mut out: Vec<Location> = urls.into_iter().map(|u| Location::parse(u)).collect();
        for path in resolve_file_path_patterns(files)? {
            out.push(Location::File(path));
        }
        Ok(out)
    }

    /// Convert every input in parallel; fails on the first broken input.
    fn convert_all(&self, converter: &Converter) -> Result<Vec<(Location, ConversionData)>> {
        self.locations()?
            .into_par_iter()
            .map(|location| -> Result<(Location, ConversionData)> {
                let data = converter.convert(&location)?;
                Ok((location, data))
            })
            .collect()
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Openapi(target) => {
                let converter = target
                    .input_settings
                    .converter(target.title.as_ref(), target.api_version.as_ref())?;
                let results = target.input_settings.convert_all(&converter)?;
                let several = results.len() > 1;
                for (location, data) in &results {
                    let src = if target.json { data.openapi_json()? } else { data.openapi_yaml()? };
                    match target.out.as_ref() {
                        Some(out) if several => {
                            let ext = if target.json { "json" } else { "yaml" };
                            let stem = location.file_stem().unwrap_or_else(|| "openapi".to_string());
                            write_output(&out.join(format!("{stem}.{ext}")), &src)?;
                        }
                        Some(out) => write_output(out, &src)?,
                        None => println!("{src}"),
                    }
                    report(location, data);
                }
            }
            Command::Templates(target) => {
                let converter = target.input_settings.converter(None, None)?;
                let results = target.input_settings.convert_all(&converter)?;
                for (location, data) in &results {
                    for (operation_id, element) in &data.request_bodies {
                        match target.out.as_ref() {
                            Some(dir) => {
                                let stem = location.file_stem().unwrap_or_default();
                                let dir = if results.len() > 1 { dir.join(stem) } else { dir.clone() };
                                write_output(&dir.join(format!("{operation_id}.xml")), &element.template)?;
                            }
                            None => {
                                println!("<!-- {operation_id} soapAction=\"{}\" envelope=\"{}\" -->",
                                    element.soap_action, element.soap_namespace);
                                println!("{}", element.template);
                            }
                        }
                    }
                    report(location, data);
                }
            }
            Command::Paths(target) => {
                for source_path in resolve_file_path_patterns(&target.input)? {
                    let source = std::fs::read_to_string(&source_path)
                        .with_context(|| format!("failed to read {}", source_path.display()))?;
                    let value = serde_json::from_str::<serde_json::Value>(&source)
                        .with_context(|| format!("failed to parse JSON source file ({})", source_path.display()))?;
                    for path in soap2rest::paths::extract_json(&value) {
                        println!("{path}");
                    }
                }
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn report(location: &Location, data: &ConversionData) {
    eprintln!(
        "{} {location} → service {} / port {}: {} operations",
        "✓".green(),
        data.soap_service.bold(),
        data.soap_port.bold(),
        data.request_bodies.len(),
    );
}

fn write_output(out: &Path, src: &str) -> Result<()> {
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, src).with_context(|| format!("failed to write {}", out.display()))
}

fn is_url(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://")
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globs_and_literals() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.wsdl", "b.wsdl", "c.xsd"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let pattern = format!("{}/*.wsdl", dir.path().display());
        let found = resolve_file_path_patterns([pattern.as_str(), "literal.wsdl"]).unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[2], PathBuf::from("literal.wsdl"));

        let none = format!("{}/*.json", dir.path().display());
        assert!(resolve_file_path_patterns([none.as_str()]).is_err());
    }

    #[test]
    fn urls_bypass_globbing() {
        let settings = InputSettings {
            input: vec!["http://example.com/svc?wsdl".into(), "local.wsdl".into()],
            config: None,
        };
        let locations = settings.locations().unwrap();
        assert!(matches!(locations[0], Location::Url(_)));
        assert_eq!(locations[1], Location::File(PathBuf::from("local.wsdl")));
    }

    #[test]
    fn cli_flags_override_config() {
        let settings = InputSettings { input: vec!["x.wsdl".into()], config: None };
        let title = "T".to_string();
        let converter = settings.converter(Some(&title), None).unwrap();
        assert_eq!(converter.config().title.as_deref(), Some("T"));
        assert_eq!(converter.config().version_or_default(), "1.0.0");
    }
}
