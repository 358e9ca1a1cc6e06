//! Addressable XML element tree
//!
//! A small DOM built on top of the `quick-xml` event reader. Nodes live in an
//! arena and are addressed by [`NodeId`] handles that stay valid for the
//! lifetime of the [`Document`], including across edits.
//!
//! Every parsed node remembers the byte span it occupied in the source, so
//! [`Document::render`] can copy untouched subtrees verbatim and only
//! re-serialize what an edit actually changed.

use crate::{NzbError, Result};
use quick_xml::Reader;
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use std::ops::Range;

/// Handle to a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Element attribute with its entity references already decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified attribute name as written
    pub name: String,
    /// Decoded value
    pub value: String,
}

/// Element node
#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<NodeId>,
    self_closing: bool,
    start_tag: Option<Range<usize>>,
    end_tag: Option<Range<usize>>,
}

impl Element {
    /// Qualified name as written, e.g. `nzb` or `ns:file`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without its namespace prefix
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// Attributes in document order
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Decoded value of the attribute called `name`
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name || local(&attr.name) == name)
            .map(|attr| attr.value.as_str())
    }

    /// Child nodes in document order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the element was written as `<name/>` in the source
    pub fn is_self_closing(&self) -> bool {
        self.self_closing
    }
}

/// What a node holds
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// An element with attributes and children
    Element(Element),
    /// Character data, decoded (CDATA sections included)
    Text(String),
    /// Declaration, doctype, comment or processing instruction, kept opaque
    Markup,
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    span: Option<Range<usize>>,
    dirty: bool,
}

/// Parsed XML document
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    nodes: Vec<Node>,
    top: Vec<NodeId>,
    root: NodeId,
    modified: bool,
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

fn position(reader: &Reader<&[u8]>) -> usize {
    reader.buffer_position() as usize
}

impl Document {
    /// Parse markup into a tree
    ///
    /// Fails with [`NzbError::Parse`] if the input is not a well-formed
    /// document with exactly one root element.
    ///
    /// # Example
    /// ```
    /// use nzb_rs::tree::Document;
    ///
    /// let doc = Document::parse("<nzb><file poster=\"a &amp; b\"/></nzb>").unwrap();
    /// let file = doc.child_elements(doc.root(), "file").next().unwrap();
    /// assert_eq!(doc.attribute(file, "poster"), Some("a & b"));
    /// assert_eq!(doc.render(), "<nzb><file poster=\"a &amp; b\"/></nzb>");
    /// ```
    pub fn parse(source: impl Into<String>) -> Result<Document> {
        let source = source.into();
        let mut nodes: Vec<Node> = Vec::new();
        let mut top = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root = None;

        {
            let mut reader = Reader::from_str(&source);
            reader.config_mut().trim_text(false);

            loop {
                let start = position(&reader);
                let event = reader
                    .read_event()
                    .map_err(|e| NzbError::parse(reader.buffer_position() as u64, e.to_string()))?;
                let end = position(&reader);

                let kind = match event {
                    Event::Start(ref e) | Event::Empty(ref e) => {
                        if stack.is_empty() && root.is_some() {
                            return Err(NzbError::parse(start as u64, "multiple root elements"));
                        }
                        let self_closing = matches!(event, Event::Empty(_));
                        NodeKind::Element(read_element(e, start, start..end, self_closing)?)
                    }
                    Event::End(_) => {
                        let id = stack.pop().ok_or_else(|| {
                            NzbError::parse(start as u64, "closing tag without an open element")
                        })?;
                        let node = &mut nodes[id.0];
                        if let NodeKind::Element(element) = &mut node.kind {
                            element.end_tag = Some(start..end);
                        }
                        if let Some(span) = &mut node.span {
                            span.end = end;
                        }
                        continue;
                    }
                    Event::Text(e) => {
                        let value = e
                            .unescape()
                            .map_err(|err| NzbError::parse(start as u64, err.to_string()))?;
                        if stack.is_empty() && !value.trim().is_empty() {
                            return Err(NzbError::parse(
                                start as u64,
                                "text outside of the root element",
                            ));
                        }
                        NodeKind::Text(value.into_owned())
                    }
                    Event::CData(e) => {
                        if stack.is_empty() {
                            return Err(NzbError::parse(
                                start as u64,
                                "CDATA outside of the root element",
                            ));
                        }
                        NodeKind::Text(String::from_utf8_lossy(&e).into_owned())
                    }
                    Event::Eof => break,
                    _ => NodeKind::Markup,
                };

                let is_open = matches!(&kind, NodeKind::Element(element) if !element.self_closing);
                let is_element = matches!(kind, NodeKind::Element(_));
                let id = NodeId(nodes.len());
                let parent = stack.last().copied();
                nodes.push(Node {
                    kind,
                    parent,
                    span: Some(start..end),
                    dirty: false,
                });

                match parent {
                    Some(parent) => {
                        if let NodeKind::Element(element) = &mut nodes[parent.0].kind {
                            element.children.push(id);
                        }
                    }
                    None => {
                        top.push(id);
                        if is_element {
                            root = Some(id);
                        }
                    }
                }

                if is_open {
                    stack.push(id);
                }
            }
        }

        if let Some(open) = stack.last() {
            let name = match &nodes[open.0].kind {
                NodeKind::Element(element) => element.name.clone(),
                _ => String::new(),
            };
            return Err(NzbError::parse(
                source.len() as u64,
                format!("unexpected end of input, <{name}> is not closed"),
            ));
        }

        let root = root.ok_or_else(|| NzbError::parse(0, "document has no root element"))?;

        Ok(Document {
            source,
            nodes,
            top,
            root,
            modified: false,
        })
    }

    /// The root element
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Source text the document was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether any node has been changed since parsing
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Kind of the node behind `id`
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|node| &node.kind)
    }

    /// Element behind `id`, if it is one
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    /// Decoded text behind `id`, if it is a text node
    pub fn text_value(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Text(value)) => Some(value),
            _ => None,
        }
    }

    /// Whether `id` is a text node made only of whitespace
    pub fn is_whitespace(&self, id: NodeId) -> bool {
        self.text_value(id)
            .is_some_and(|value| value.chars().all(char::is_whitespace))
    }

    /// Parent of `id`; `None` for top-level and detached nodes
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    /// Children of `id` (empty for anything but elements)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.element(id) {
            Some(element) => &element.children,
            None => &[],
        }
    }

    /// Child elements of `id` whose local name is `name`
    pub fn child_elements<'a>(
        &'a self,
        id: NodeId,
        name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id).iter().copied().filter(move |&child| {
            self.element(child)
                .is_some_and(|element| element.local_name() == name)
        })
    }

    /// Decoded attribute value of element `id`
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|element| element.attribute(name))
    }

    /// Concatenated decoded text of the direct text children of `id`
    pub fn text(&self, id: NodeId) -> String {
        self.children(id)
            .iter()
            .filter_map(|&child| self.text_value(child))
            .collect()
    }

    /// Create a detached element
    pub fn create_element<N, V>(
        &mut self,
        name: impl Into<String>,
        attributes: impl IntoIterator<Item = (N, V)>,
    ) -> NodeId
    where
        N: Into<String>,
        V: Into<String>,
    {
        let element = Element {
            name: name.into(),
            attributes: attributes
                .into_iter()
                .map(|(name, value)| Attribute {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
            children: Vec::new(),
            self_closing: false,
            start_tag: None,
            end_tag: None,
        };
        self.push_detached(NodeKind::Element(element))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, value: impl Into<String>) -> NodeId {
        self.push_detached(NodeKind::Text(value.into()))
    }

    fn push_detached(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            span: None,
            dirty: true,
        });
        id
    }

    /// Insert `child` into `parent` at `index` (clamped to the child count)
    ///
    /// A child that is attached elsewhere is moved.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.check_attachable(parent, child)?;
        self.detach(child);
        if let Some(NodeKind::Element(element)) = self.nodes.get_mut(parent.0).map(|n| &mut n.kind)
        {
            let index = index.min(element.children.len());
            element.children.insert(index, child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.mark_dirty(parent);
        Ok(())
    }

    /// Append `child` as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_child(parent, usize::MAX, child)
    }

    /// Remove `child` from `parent`; returns false if it was not a child
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(child);
        true
    }

    /// Replace all children of `parent`
    ///
    /// Nodes from the old child list that reappear in `children` keep their
    /// source bytes.
    pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) -> Result<()> {
        if self.element(parent).is_none() {
            return Err(NzbError::EditConflict("node is not an element".to_string()));
        }
        for &child in &children {
            self.check_attachable(parent, child)?;
        }

        let old = self.children(parent).to_vec();
        for child in old {
            self.nodes[child.0].parent = None;
        }
        for &child in &children {
            self.detach(child);
            self.nodes[child.0].parent = Some(parent);
        }
        if let NodeKind::Element(element) = &mut self.nodes[parent.0].kind {
            element.children = children;
        }
        self.mark_dirty(parent);
        Ok(())
    }

    fn check_attachable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.element(parent).is_none() {
            return Err(NzbError::EditConflict("node is not an element".to_string()));
        }
        if child.0 >= self.nodes.len() || child == self.root {
            return Err(NzbError::EditConflict("node cannot be attached".to_string()));
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(NzbError::EditConflict(
                    "node cannot become its own descendant".to_string(),
                ));
            }
            cursor = self.parent(id);
        }
        Ok(())
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.nodes[child.0].parent.take() else {
            return;
        };
        if let NodeKind::Element(element) = &mut self.nodes[parent.0].kind {
            element.children.retain(|&id| id != child);
        }
        self.mark_dirty(parent);
    }

    fn mark_dirty(&mut self, id: NodeId) {
        self.modified = true;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = &mut self.nodes[current.0];
            if node.dirty && node.span.is_some() {
                break;
            }
            node.dirty = true;
            cursor = node.parent;
        }
    }

    /// Serialize the document back to markup
    ///
    /// Unchanged nodes are copied from the source byte for byte; an
    /// unmodified document renders exactly as it was parsed.
    pub fn render(&self) -> String {
        if !self.modified {
            return self.source.clone();
        }
        let mut out = String::with_capacity(self.source.len() + 256);
        for &id in &self.top {
            self.render_node(id, &mut out);
        }
        out
    }

    /// Serialize a single node (and its subtree)
    pub fn render_node_to_string(&self, id: NodeId) -> String {
        let mut out = String::new();
        if id.0 < self.nodes.len() {
            self.render_node(id, &mut out);
        }
        out
    }

    fn render_node(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0];
        if !node.dirty {
            if let Some(span) = &node.span {
                out.push_str(&self.source[span.clone()]);
                return;
            }
        }
        match &node.kind {
            NodeKind::Text(value) => out.push_str(&partial_escape(value)),
            NodeKind::Markup => {
                if let Some(span) = &node.span {
                    out.push_str(&self.source[span.clone()]);
                }
            }
            NodeKind::Element(element) => self.render_element(element, out),
        }
    }

    fn render_element(&self, element: &Element, out: &mut String) {
        match (&element.start_tag, element.self_closing) {
            (Some(start), false) => {
                out.push_str(&self.source[start.clone()]);
                for &child in &element.children {
                    self.render_node(child, out);
                }
                match &element.end_tag {
                    Some(end) => out.push_str(&self.source[end.clone()]),
                    None => push_end_tag(&element.name, out),
                }
            }
            (Some(start), true) if element.children.is_empty() => {
                out.push_str(&self.source[start.clone()]);
            }
            _ if element.children.is_empty() => push_start_tag(element, true, out),
            _ => {
                push_start_tag(element, false, out);
                for &child in &element.children {
                    self.render_node(child, out);
                }
                push_end_tag(&element.name, out);
            }
        }
    }
}

fn read_element(
    start: &BytesStart<'_>,
    offset: usize,
    tag: Range<usize>,
    self_closing: bool,
) -> Result<Element> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| NzbError::parse(offset as u64, e.to_string()))?
        .to_string();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| NzbError::parse(offset as u64, e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| NzbError::parse(offset as u64, e.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| NzbError::parse(offset as u64, e.to_string()))?
            .into_owned();
        attributes.push(Attribute { name: key, value });
    }

    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        self_closing,
        start_tag: Some(tag),
        end_tag: None,
    })
}

fn push_start_tag(element: &Element, close: bool, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for attr in &element.attributes {
        out.push(' ');
        out.push_str(&attr.name);
        out.push_str("=\"");
        out.push_str(&escape(attr.value.as_str()));
        out.push('"');
    }
    out.push_str(if close { "/>" } else { ">" });
}

fn push_end_tag(name: &str, out: &mut String) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

impl std::str::FromStr for Document {
    type Err = NzbError;

    fn from_str(s: &str) -> Result<Self> {
        Document::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nzb PUBLIC "-//newzBin//DTD NZB 1.1//EN" "http://www.newzbin.com/DTD/nzb/nzb-1.1.dtd">
<nzb xmlns="http://www.newzbin.com/DTD/2003/nzb">
  <!-- generated -->
  <head>
    <meta type="title">A &amp; B</meta>
  </head>
  <file poster="x &lt;y&gt;" date="1" subject='single "quoted"'>
    <segments><segment bytes="1" number="1"><![CDATA[id@host]]></segment></segments>
  </file>
</nzb>
"#;

    #[test]
    fn test_parse_builds_tree() {
        let doc = Document::parse(SAMPLE).unwrap();
        let root = doc.root();
        assert_eq!(doc.element(root).unwrap().local_name(), "nzb");

        let head = doc.child_elements(root, "head").next().unwrap();
        let meta = doc.child_elements(head, "meta").next().unwrap();
        assert_eq!(doc.attribute(meta, "type"), Some("title"));
        assert_eq!(doc.text(meta), "A & B");

        let file = doc.child_elements(root, "file").next().unwrap();
        assert_eq!(doc.attribute(file, "poster"), Some("x <y>"));
        assert_eq!(doc.attribute(file, "subject"), Some(r#"single "quoted""#));

        let segments = doc.child_elements(file, "segments").next().unwrap();
        let segment = doc.child_elements(segments, "segment").next().unwrap();
        assert_eq!(doc.text(segment), "id@host");
        assert_eq!(doc.parent(segment), Some(segments));
    }

    #[test]
    fn test_unmodified_render_is_identical() {
        let doc = Document::parse(SAMPLE).unwrap();
        assert!(!doc.is_modified());
        assert_eq!(doc.render(), SAMPLE);
    }

    #[test]
    fn test_spans_tile_the_source() {
        let mut doc = Document::parse(SAMPLE).unwrap();
        // Touch the root so rendering walks every top-level node by span.
        let root = doc.root();
        let marker = doc.create_text("");
        doc.append_child(root, marker).unwrap();
        assert!(doc.is_modified());
        assert_eq!(doc.render(), SAMPLE);
    }

    #[test]
    fn test_namespaced_names() {
        let doc = Document::parse(r#"<n:nzb xmlns:n="urn:x"><n:file n:poster="p"/></n:nzb>"#)
            .unwrap();
        let file = doc.child_elements(doc.root(), "file").next().unwrap();
        assert_eq!(doc.element(file).unwrap().name(), "n:file");
        assert_eq!(doc.attribute(file, "poster"), Some("p"));
    }

    #[test]
    fn test_unclosed_element_is_parse_error() {
        let err = Document::parse("<nzb><file>").unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("<file>"));
    }

    #[test]
    fn test_mismatched_end_tag_is_parse_error() {
        let err = Document::parse("<nzb><file></segment></nzb>").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_truncated_tag_is_parse_error() {
        assert!(Document::parse("<nzb><file poster=\"x").unwrap_err().is_parse());
    }

    #[test]
    fn test_multiple_roots_rejected() {
        let err = Document::parse("<a/><b/>").unwrap_err();
        assert!(err.to_string().contains("multiple root"));
    }

    #[test]
    fn test_text_outside_root_rejected() {
        assert!(Document::parse("<a/>junk").unwrap_err().is_parse());
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(Document::parse("").unwrap_err().is_parse());
        assert!(Document::parse("   \n").unwrap_err().is_parse());
    }

    #[test]
    fn test_undefined_entity_rejected() {
        assert!(Document::parse("<a>&bogus;</a>").unwrap_err().is_parse());
    }

    #[test]
    fn test_insert_synthesized_element() {
        let mut doc = Document::parse("<nzb>\n  <file/>\n</nzb>").unwrap();
        let root = doc.root();
        let head = doc.create_element("head", [("kind", "a\"b")]);
        let text = doc.create_text("x < y");
        doc.append_child(head, text).unwrap();
        doc.insert_child(root, 1, head).unwrap();
        assert_eq!(
            doc.render(),
            "<nzb>\n  <head kind=\"a&quot;b\">x &lt; y</head><file/>\n</nzb>"
        );
    }

    #[test]
    fn test_self_closing_parent_gets_tags() {
        let mut doc = Document::parse("<nzb><head/></nzb>").unwrap();
        let head = doc.child_elements(doc.root(), "head").next().unwrap();
        let meta = doc.create_element("meta", [("type", "tag")]);
        doc.append_child(head, meta).unwrap();
        assert_eq!(doc.render(), "<nzb><head><meta type=\"tag\"/></head></nzb>");
    }

    #[test]
    fn test_remove_and_reorder_children() {
        let mut doc = Document::parse("<r><a x='1'/><b/><c>t</c></r>").unwrap();
        let root = doc.root();
        let kids = doc.children(root).to_vec();
        assert!(doc.remove_child(root, kids[1]));
        assert!(!doc.remove_child(root, kids[1]));
        doc.set_children(root, vec![kids[2], kids[0]]).unwrap();
        assert_eq!(doc.render(), "<r><c>t</c><a x='1'/></r>");
        assert_eq!(doc.parent(kids[1]), None);
    }

    #[test]
    fn test_cannot_attach_ancestor() {
        let mut doc = Document::parse("<r><a><b/></a></r>").unwrap();
        let a = doc.children(doc.root())[0];
        let b = doc.children(a)[0];
        assert!(doc.append_child(b, a).is_err());
        assert!(doc.append_child(b, doc.root()).is_err());
        assert!(!doc.is_modified());
    }
}
