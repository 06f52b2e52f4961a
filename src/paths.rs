//! Example tree → ordered JSON paths.
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::TemplateError;
use crate::example::{Declaration, Example};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub name: String,
    pub indices: Vec<usize>,
}

impl Segment {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), indices: Vec::new() }
    }

    pub fn is_array(&self) -> bool {
        !self.indices.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JsonPath {
    pub segments: Vec<Segment>,
}

impl JsonPath {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment names only, `a.b.c`.
    pub fn plain(&self) -> String {
        self.segments.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(".")
    }

    fn pushed(&self, segment: Segment) -> Self {
        let mut next = self.clone();
        next.segments.push(segment);
        next
    }

    fn indexed(&self, index: usize) -> Self {
        let mut next = self.clone();
        if let Some(last) = next.segments.last_mut() {
            last.indices.push(index);
        }
        next
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&seg.name)?;
            for idx in &seg.indices {
                write!(f, "[{idx}]")?;
            }
        }
        Ok(())
    }
}

impl FromStr for JsonPath {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TemplateError::InvalidPath(s.to_string());
        let mut segments = Vec::new();
        for part in s.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(at) => part.split_at(at),
                None => (part, ""),
            };
            if name.is_empty() {
                return Err(invalid());
            }
            let mut seg = Segment::new(name);
            while let Some(open) = rest.strip_prefix('[') {
                let close = open.find(']').ok_or_else(invalid)?;
                seg.indices.push(open[..close].parse().map_err(|_| invalid())?);
                rest = &open[close + 1..];
            }
            if !rest.is_empty() {
                return Err(invalid());
            }
            segments.push(seg);
        }
        Ok(JsonPath { segments })
    }
}

/// How each field was declared by its enclosing object schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentSchemas {
    by_field: IndexMap<String, Declaration>,
    by_path: IndexMap<String, Declaration>,
}

impl SegmentSchemas {
    pub fn record(&mut self, field: &str, plain_path: &str, declaration: &Declaration) {
        self.by_field.insert(field.to_string(), declaration.clone());
        self.by_path.insert(plain_path.to_string(), declaration.clone());
    }

    /// Exact path first, then the (last recorded) declaration for the field name.
    pub fn lookup(&self, plain_path: &str, field: &str) -> Option<&Declaration> {
        self.by_path.get(plain_path).or_else(|| self.by_field.get(field))
    }

    /// Field name → declaring component, for fields whose enclosing schema is named.
    pub fn schema_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_field
            .iter()
            .filter_map(|(field, d)| d.schema.as_deref().map(|schema| (field.as_str(), schema)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub paths: Vec<JsonPath>,
    pub schemas: SegmentSchemas,
}

/// Depth-first, left-to-right. Only object roots produce paths.
pub fn extract(example: &Example) -> Extraction {
    let mut out = Extraction::default();
    if let Example::Object { fields, .. } = example {
        read_object(fields, &JsonPath::default(), &mut out);
    }
    out
}

pub fn extract_json(value: &serde_json::Value) -> Vec<JsonPath> {
    extract(&Example::from_json(value)).paths
}

fn read_object(fields: &IndexMap<String, Example>, path: &JsonPath, out: &mut Extraction) {
    if fields.is_empty() {
        if !path.is_empty() {
            out.paths.push(path.clone());
        }
        return;
    }
    for (key, value) in fields {
        let child = path.pushed(Segment::new(key.clone()));
        if let Some(origin) = value.origin() {
            out.schemas.record(key, &child.plain(), origin);
        }
        read_value(value, child, out);
    }
}

fn read_value(value: &Example, path: JsonPath, out: &mut Extraction) {
    match value {
        Example::Object { fields, .. } => read_object(fields, &path, out),
        Example::Array { items, .. } => {
            for (i, item) in items.iter().enumerate() {
                read_value(item, path.indexed(i), out);
            }
        }
        Example::Value { .. } => out.paths.push(path),
    }
}
