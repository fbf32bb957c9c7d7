//! Lossless XML tree for WordprocessingML parts.
//!
//! Parts are parsed with `quick-xml` into a small element tree that keeps the
//! original markup of every node it does not touch. Serializing an unmodified
//! tree reproduces the input text exactly, so only edited runs differ from the
//! source part.

use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A node of the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Character data, kept escaped exactly as it appeared in the source.
    Text(String),
    /// Declarations, comments, processing instructions and CDATA sections,
    /// written back verbatim.
    Markup(String),
}

/// An element with its attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    /// Original start tag content, dropped once an attribute changes.
    raw_start: Option<String>,
    children: Vec<Node>,
    self_closing: bool,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            raw_start: None,
            children: Vec::new(),
            self_closing: true,
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style child appender.
    #[cfg(any(test, feature = "test-util"))]
    pub fn with_child(mut self, child: Element) -> Self {
        self.push_element(child);
        self
    }

    /// Builder-style text appender. `text` is unescaped.
    pub fn with_text(mut self, text: &str) -> Self {
        self.push_text(text);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// Namespace prefix of the element name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Qualifies `local` with this element's prefix.
    pub fn qualified(&self, local: &str) -> String {
        match self.prefix() {
            Some(prefix) => format!("{}:{}", prefix, local),
            None => local.to_string(),
        }
    }

    /// Attribute value by exact name.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value by local name, ignoring the prefix.
    pub fn attr_local(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| local(k) == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        self.raw_start = None;
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((key, value)),
        }
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First direct child with the given local name.
    pub fn find_local(&self, local_name: &str) -> Option<&Element> {
        self.child_elements()
            .find(|el| el.local_name() == local_name)
    }

    pub fn find_local_mut(&mut self, local_name: &str) -> Option<&mut Element> {
        self.child_elements_mut()
            .find(|el| el.local_name() == local_name)
    }

    pub fn push_element(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Appends unescaped text, merging with a trailing text node.
    pub fn push_text(&mut self, text: &str) {
        let escaped = escape(text);
        match self.children.last_mut() {
            Some(Node::Text(existing)) => existing.push_str(&escaped),
            _ => self.children.push(Node::Text(escaped.into_owned())),
        }
    }

    /// Concatenated unescaped text of the direct text children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(raw) = node {
                match unescape(raw) {
                    Ok(text) => out.push_str(&text),
                    Err(_) => out.push_str(raw),
                }
            }
        }
        out
    }

    fn from_start(start: &BytesStart<'_>, self_closing: bool) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let raw_value = String::from_utf8_lossy(&attr.value).into_owned();
            let value = unescape(&raw_value)
                .map(|v| v.into_owned())
                .map_err(|e| e.to_string())?;
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            raw_start: Some(String::from_utf8_lossy(start).into_owned()),
            children: Vec::new(),
            self_closing,
        })
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        match &self.raw_start {
            Some(raw) => out.push_str(raw),
            None => {
                out.push_str(&self.name);
                for (key, value) in &self.attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape(value.as_str()));
                    out.push('"');
                }
            }
        }
        if self.self_closing && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            child.write_to(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl Node {
    fn write_to(&self, out: &mut String) {
        match self {
            Node::Element(el) => el.write_to(out),
            Node::Text(raw) | Node::Markup(raw) => out.push_str(raw),
        }
    }
}

/// A parsed XML part: prolog nodes plus the root element.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    nodes: Vec<Node>,
}

impl XmlDocument {
    /// A new part with the standard declaration.
    pub fn from_root(root: Element) -> Self {
        Self {
            nodes: vec![
                Node::Markup(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#.to_string(),
                ),
                Node::Text("\n".to_string()),
                Node::Element(root),
            ],
        }
    }

    /// Parses a part. Errors carry the reader position.
    pub fn parse(xml: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut top: Vec<Node> = Vec::new();

        loop {
            let event = reader
                .read_event()
                .map_err(|e| format!("{} at position {}", e, reader.error_position()))?;
            let node = match event {
                Event::Start(start) => {
                    let mut el = Element::from_start(&start, false)?;
                    el.self_closing = false;
                    stack.push(el);
                    continue;
                }
                Event::Empty(start) => Node::Element(Element::from_start(&start, true)?),
                Event::End(_) => match stack.pop() {
                    Some(el) => Node::Element(el),
                    None => {
                        return Err(format!(
                            "unexpected closing tag at position {}",
                            reader.buffer_position()
                        ))
                    }
                },
                Event::Text(text) => Node::Text(String::from_utf8_lossy(&text).into_owned()),
                Event::GeneralRef(reference) => {
                    Node::Text(format!("&{};", String::from_utf8_lossy(&reference)))
                }
                Event::CData(data) => Node::Markup(format!(
                    "<![CDATA[{}]]>",
                    String::from_utf8_lossy(&data)
                )),
                Event::Comment(comment) => {
                    Node::Markup(format!("<!--{}-->", String::from_utf8_lossy(&comment)))
                }
                Event::Decl(decl) => {
                    Node::Markup(format!("<?{}?>", String::from_utf8_lossy(&decl)))
                }
                Event::PI(pi) => Node::Markup(format!("<?{}?>", String::from_utf8_lossy(&pi))),
                Event::DocType(doctype) => Node::Markup(format!(
                    "<!DOCTYPE {}>",
                    String::from_utf8_lossy(&doctype).trim()
                )),
                Event::Eof => break,
            };
            append(&mut stack, &mut top, node);
        }

        if let Some(open) = stack.last() {
            return Err(format!("unclosed element <{}>", open.name));
        }
        if !top.iter().any(|node| matches!(node, Node::Element(_))) {
            return Err("no root element".to_string());
        }
        Ok(Self { nodes: top })
    }

    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_to(&mut out);
        }
        out
    }
}

fn append(stack: &mut [Element], top: &mut Vec<Node>, node: Node) {
    let target = match stack.last_mut() {
        Some(parent) => &mut parent.children,
        None => top,
    };
    if let Node::Text(text) = &node {
        if let Some(Node::Text(existing)) = target.last_mut() {
            existing.push_str(text);
            return;
        }
    }
    target.push(node);
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}
