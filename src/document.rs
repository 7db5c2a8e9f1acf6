// Parsed XML response document shared by every resource view
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("XML parse error: {0}")]
    XmlParseError(String),

    #[error("Response is not valid UTF-8: {0}")]
    EncodingError(String),

    #[error("Unbalanced element </{0}>")]
    UnbalancedElement(String),

    #[error("Unclosed element <{0}>")]
    UnclosedElement(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Index of a node inside a [`Document`]. Ids follow document order.
pub type NodeId = usize;

/// The virtual document node every query starts from.
pub const DOCUMENT_NODE: NodeId = 0;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// An immutable, arena-allocated XML tree.
///
/// Whitespace-only text is indentation when it sits next to child elements and
/// is dropped while parsing. Inside a text-only element it is content and kept
/// as is. Every other text run (entity and character references included)
/// becomes one text node, and every node in the arena is reachable from the
/// document node.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    /// A document with no root element. Every query against it matches nothing.
    pub fn empty() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let xml =
            std::str::from_utf8(bytes).map_err(|e| DocumentError::EncodingError(e.to_string()))?;
        Self::parse(xml)
    }

    pub fn parse(xml: &str) -> Result<Self, DocumentError> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
        let mut document = Self::empty();
        let mut open: Vec<NodeId> = vec![DOCUMENT_NODE];
        // text of the innermost open element not yet placed in the tree
        let mut pending = String::new();

        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        loop {
            let current = *open.last().unwrap_or(&DOCUMENT_NODE);
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    document.flush_text(current, &mut pending, true);
                    let id = document.push_element(current, &e)?;
                    open.push(id);
                }
                Ok(Event::Empty(e)) => {
                    document.flush_text(current, &mut pending, true);
                    document.push_element(current, &e)?;
                }
                Ok(Event::End(e)) => {
                    let name = utf8(e.name().as_ref())?;
                    if open.len() <= 1 {
                        return Err(DocumentError::UnbalancedElement(name));
                    }
                    document.flush_text(current, &mut pending, false);
                    open.pop();
                }
                Ok(Event::Text(e)) => {
                    let raw = utf8(&e)?;
                    let text = quick_xml::escape::unescape(&raw)
                        .map_err(|e| DocumentError::XmlParseError(e.to_string()))?;
                    pending.push_str(&text);
                }
                Ok(Event::CData(e)) => {
                    pending.push_str(&utf8(&e)?);
                }
                Ok(Event::GeneralRef(e)) => {
                    let entity = utf8(&e)?;
                    let resolved = resolve_reference(&entity).ok_or_else(|| {
                        DocumentError::XmlParseError(format!("Unknown entity &{};", entity))
                    })?;
                    pending.push_str(&resolved);
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(DocumentError::XmlParseError(format!(
                        "error at position {}: {}",
                        reader.error_position(),
                        e
                    )))
                }
                // Declarations, comments, processing instructions and DTDs carry no data
                Ok(_) => (),
            }
        }

        if open.len() > 1 {
            let unclosed = open[open.len() - 1];
            return Err(DocumentError::UnclosedElement(
                document.name(unclosed).unwrap_or_default().to_string(),
            ));
        }

        // only the prolog and trailing newlines can be left over here
        pending.clear();
        Ok(document)
    }

    fn push_element(&mut self, parent: NodeId, start: &BytesStart) -> Result<NodeId, DocumentError> {
        let name = utf8(start.name().as_ref())?;
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute =
                attribute.map_err(|e| DocumentError::XmlParseError(e.to_string()))?;
            let key = utf8(attribute.key.as_ref())?;
            let value = attribute
                .unescape_value()
                .map_err(|e| DocumentError::XmlParseError(e.to_string()))?;
            attributes.push((key, value.into_owned()));
        }
        Ok(self.push(parent, NodeKind::Element { name, attributes }))
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    // Places buffered text under `parent`. Blank text is indentation when an
    // element follows it or `parent` already holds elements.
    fn flush_text(&mut self, parent: NodeId, pending: &mut String, element_follows: bool) {
        if pending.is_empty() {
            return;
        }
        let text = std::mem::take(pending);
        let indentation = is_blank(&text)
            && (element_follows
                || parent == DOCUMENT_NODE
                || self.children(parent).iter().any(|&c| self.is_element(c)));
        if !indentation {
            self.push(parent, NodeKind::Text(text));
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root_element().is_none()
    }

    pub fn root_element(&self) -> Option<NodeId> {
        self.children(DOCUMENT_NODE)
            .iter()
            .copied()
            .find(|&id| self.is_element(id))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// All descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            result.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        result
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id).map(|n| &n.kind),
            Some(NodeKind::Element { .. })
        )
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        match self.nodes.get(id).map(|n| &n.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes,
            _ => &[],
        }
    }

    /// Content of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Concatenated text of every text node below `id`, in document order.
    pub fn string_value(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|d| self.text(d))
            .collect()
    }

    /// Serializes the tree back to XML text.
    pub fn to_xml(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new(Vec::new());
        for &child in self.children(DOCUMENT_NODE) {
            self.write_node(&mut writer, child)?;
        }
        String::from_utf8(writer.into_inner())
            .map_err(|e| DocumentError::SerializationError(e.to_string()))
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> Result<(), DocumentError> {
        let node = match self.nodes.get(id) {
            Some(node) => node,
            None => return Ok(()),
        };
        let result = match &node.kind {
            NodeKind::Document => Ok(()),
            NodeKind::Text(text) => writer.write_event(Event::Text(BytesText::new(text))),
            NodeKind::Element { name, attributes } => {
                let mut start = BytesStart::new(name.as_str());
                for (key, value) in attributes {
                    start.push_attribute((key.as_str(), value.as_str()));
                }
                if node.children.is_empty() {
                    writer.write_event(Event::Empty(start))
                } else {
                    writer.write_event(Event::Start(start)).map_err(|e| {
                        DocumentError::SerializationError(e.to_string())
                    })?;
                    for &child in &node.children {
                        self.write_node(writer, child)?;
                    }
                    writer.write_event(Event::End(BytesEnd::new(name.as_str())))
                }
            }
        };
        result.map_err(|e| DocumentError::SerializationError(e.to_string()))
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let xml = self.to_xml().map_err(|_| fmt::Error)?;
        f.write_str(&xml)
    }
}

fn utf8(bytes: &[u8]) -> Result<String, DocumentError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| DocumentError::EncodingError(e.to_string()))
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

fn resolve_reference(entity: &str) -> Option<String> {
    if let Some(code) = entity.strip_prefix('#') {
        let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => code.parse::<u32>().ok()?,
        };
        return char::from_u32(value).map(String::from);
    }
    let resolved = match entity {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "apos" => "'",
        "quot" => "\"",
        _ => return None,
    };
    Some(resolved.to_string())
}
