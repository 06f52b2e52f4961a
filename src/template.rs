//! SOAP request templates: JSON paths folded back into an XML skeleton.
//!
//! The tree is built as a typed arena first (`TemplateNode`), then rendered with
//! `quick-xml`. Leaves carry `${…}` placeholders over the escaped JSON path, array
//! anchors carry `ARRAY_PLACEHOLDER`, and optional fields are wrapped in
//! `<ifPlaceholder condition="…?has_content">`.
use indexmap::IndexMap;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use tracing::{debug, warn};

use crate::error::TemplateError;
use crate::lower::{ATTR_CONTENT_KEYWORD, BASE_CONTENT_KEYWORD};
use crate::paths::{JsonPath, Segment, SegmentSchemas};

pub const NAMESPACE_PREFIX: &str = "web";
pub const ARRAY_PLACEHOLDER: &str = "ARRAY_PLACEHOLDER";
pub const IF_PLACEHOLDER: &str = "ifPlaceholder";
pub const IF_CONDITION: &str = "condition";
pub const HAS_CONTENT: &str = "?has_content";
pub const QUERY_VARIABLE_PREFIX: &str = "uri.var.";

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemplateNode {
    pub name: String,
    /// Rendered as `web:<name>` in the operation namespace.
    pub qualified: bool,
    pub attributes: IndexMap<String, String>,
    pub text: Option<String>,
    pub array_anchor: Option<String>,
    pub optional_guard: Option<String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    /// Unescaped path without indices; identifies the node for reuse.
    pub plain_path: String,
}

impl TemplateNode {
    pub fn tag(&self) -> String {
        if self.qualified { format!("{NAMESPACE_PREFIX}:{}", self.name) } else { self.name.clone() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Template {
    pub namespace: String,
    nodes: Vec<TemplateNode>,
    /// Top-level nodes, in document order.
    roots: Vec<NodeId>,
    wrapper: Option<NodeId>,
}

impl Template {
    pub fn node(&self, id: NodeId) -> &TemplateNode {
        &self.nodes[id]
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn wrapper(&self) -> Option<NodeId> {
        self.wrapper
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes with this tag (`web:` prefix included when qualified).
    pub fn find_by_tag<'t>(&'t self, tag: &'t str) -> impl Iterator<Item = &'t TemplateNode> + 't {
        self.nodes.iter().filter(move |n| n.tag() == tag)
    }

    fn add(&mut self, parent: Option<NodeId>, mut node: TemplateNode) -> NodeId {
        let id = self.nodes.len();
        node.parent = parent;
        self.nodes.push(node);
        match parent {
            Some(p) => self.nodes[p].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Move every top-level node under a new qualified root.
    fn wrap_roots(&mut self, name: &str) {
        let children = std::mem::take(&mut self.roots);
        let root = TemplateNode { name: name.to_string(), qualified: true, ..TemplateNode::default() };
        let id = self.add(None, root);
        for &child in &children {
            self.nodes[child].parent = Some(id);
        }
        self.nodes[id].children = children;
        self.wrapper = Some(id);
    }

    fn has_qualified_ancestor(&self, id: NodeId) -> bool {
        let mut cursor = self.nodes[id].parent;
        while let Some(p) = cursor {
            if self.nodes[p].qualified {
                return true;
            }
            cursor = self.nodes[p].parent;
        }
        false
    }

    pub fn render(&self) -> Result<String, TemplateError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        for &root in &self.roots {
            self.write_node(&mut writer, root)?;
        }
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> Result<(), TemplateError> {
        let node = &self.nodes[id];
        if let Some(condition) = &node.optional_guard {
            let mut guard = BytesStart::new(IF_PLACEHOLDER);
            guard.push_attribute((IF_CONDITION, condition.as_str()));
            writer.write_event(Event::Start(guard))?;
        }

        let tag = node.tag();
        let mut start = BytesStart::new(tag.as_str());
        if node.qualified {
            if !self.has_qualified_ancestor(id) {
                start.push_attribute(("xmlns:web", self.namespace.as_str()));
            }
        } else {
            start.push_attribute(("xmlns", ""));
        }
        if let Some(anchor) = &node.array_anchor {
            start.push_attribute((ARRAY_PLACEHOLDER, anchor.as_str()));
        }
        for (k, v) in &node.attributes {
            start.push_attribute((k.as_str(), v.as_str()));
        }

        if node.children.is_empty() && node.text.is_none() {
            writer.write_event(Event::Empty(start))?;
        } else {
            writer.write_event(Event::Start(start))?;
            if let Some(text) = &node.text {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            }
            for &child in &node.children {
                self.write_node(writer, child)?;
            }
            writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
        }

        if node.optional_guard.is_some() {
            writer.write_event(Event::End(BytesEnd::new(IF_PLACEHOLDER)))?;
        }
        Ok(())
    }
}

/// Backslash-escape the characters the templating engine treats specially.
pub fn escape_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '-' | '.' | ':') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn placeholder(path: &str) -> String {
    format!("${{{path}}}")
}

/// Operation-level inputs of the synthesizer.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub operation_id: &'a str,
    pub namespace: &'a str,
    pub segment_schemas: &'a SegmentSchemas,
    /// RPC style or RPC message type: the body is wrapped in `web:<operationId>`.
    pub rpc: bool,
}

pub fn synthesize(
    cx: TemplateContext<'_>,
    paths: &[JsonPath],
    query_parameters: &IndexMap<String, String>,
) -> Template {
    let mut template = Template { namespace: cx.namespace.to_string(), ..Template::default() };

    if cx.rpc || paths.is_empty() {
        let root = TemplateNode { name: cx.operation_id.to_string(), qualified: true, ..TemplateNode::default() };
        template.wrapper = Some(template.add(None, root));
    }

    for path in paths {
        insert_path(&mut template, cx, path);
    }
    if template.roots.len() > 1 {
        warn!(
            "operation `{}` has {} top-level body elements; wrapping them in <{NAMESPACE_PREFIX}:{}>",
            cx.operation_id,
            template.roots.len(),
            cx.operation_id
        );
        template.wrap_roots(cx.operation_id);
    }

    if paths.is_empty() {
        for param in query_parameters.keys() {
            let node = TemplateNode {
                name: param.clone(),
                qualified: true,
                text: Some(placeholder(&format!("{QUERY_VARIABLE_PREFIX}{param}"))),
                ..TemplateNode::default()
            };
            template.add(template.wrapper, node);
        }
    } else if !query_parameters.is_empty() {
        warn!(
            "operation `{}` has both query parameters and a body; the query parameters are ignored",
            cx.operation_id
        );
    }
    template
}

/// Escaped form of `segments`, indices kept (`a\-b[0].c`).
fn escaped_path(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| {
            let mut out = escape_segment(&s.name);
            for idx in &s.indices {
                out.push_str(&format!("[{idx}]"));
            }
            out
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Escaped form with every index removed.
fn anchor_path(segments: &[Segment]) -> String {
    segments.iter().map(|s| escape_segment(&s.name)).collect::<Vec<_>>().join(".")
}

fn insert_path(template: &mut Template, cx: TemplateContext<'_>, path: &JsonPath) {
    let segments = &path.segments;
    let mut current = template.wrapper;
    let mut plain = String::new();

    let mut i = 0;
    while i < segments.len() {
        let seg = &segments[i];
        let through = &segments[..=i];

        if seg.name == ATTR_CONTENT_KEYWORD {
            let Some(attr) = segments.get(i + 1) else { break };
            let (Some(target), true) = (current, i > 0) else {
                warn!("attribute `{}` in `{path}` has no element to attach to", attr.name);
                break;
            };
            let value = placeholder(&escaped_path(&segments[..=i + 1]));
            template.nodes[target].attributes.insert(attr.name.clone(), value);
            break;
        }
        if seg.name == BASE_CONTENT_KEYWORD {
            match current {
                Some(target) if i > 0 => template.nodes[target].text = Some(placeholder(&escaped_path(through))),
                _ => warn!("text content in `{path}` has no element to attach to"),
            }
            break;
        }

        if !plain.is_empty() {
            plain.push('.');
        }
        plain.push_str(&seg.name);

        let declaring = cx.segment_schemas.lookup(&plain, &seg.name);
        let qualified = i == 0 || declaring.is_some_and(|d| d.namespace_qualified);

        let existing = template.nodes.iter().position(|n| {
            n.name == seg.name && n.qualified == qualified && n.plain_path == plain
        });
        if let Some(id) = existing.filter(|id| Some(*id) != template.wrapper) {
            debug!("reusing <{}> for `{path}`", template.nodes[id].tag());
            current = Some(id);
            i += 1;
            continue;
        }

        let mut own = through.to_vec();
        if let Some(last) = own.last_mut() {
            last.indices.clear();
        }
        let optional = i > 0 && declaring.is_some_and(|d| !d.required);
        let node = TemplateNode {
            name: seg.name.clone(),
            qualified,
            array_anchor: seg.is_array().then(|| anchor_path(through)),
            optional_guard: optional.then(|| format!("{}{HAS_CONTENT}", escaped_path(&own))),
            text: (i + 1 == segments.len()).then(|| placeholder(&escaped_path(through))),
            plain_path: plain.clone(),
            ..TemplateNode::default()
        };
        current = Some(template.add(current, node));
        i += 1;
    }
}
