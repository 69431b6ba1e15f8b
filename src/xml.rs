//! Minimal XML element tree over `quick-xml` events.
//!
//! Both document grammars in this crate (publication structure files and
//! data modules) are deeply nested, so instead of flat event scans each
//! document is parsed once into an [`Element`] tree and then walked with
//! path lookups. Re-serialization via [`Element::to_xml`] is deterministic:
//! the same tree always produces the same bytes, which is what gets
//! persisted as a node's raw markup.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{IngestError, Result};

/// One child of an element: a nested element or a run of character data.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(Element),
    Text(String),
}

/// A parsed XML element: tag name, attributes in document order, children
/// in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl Element {
    fn new(name: String) -> Self {
        Element {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Parses a complete document and returns its root element.
    pub fn parse(xml: &str) -> Result<Element> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    stack.push(element_from_start(&e)?);
                }
                Ok(Event::Empty(e)) => {
                    let elem = element_from_start(&e)?;
                    attach(&mut stack, &mut root, elem)?;
                }
                Ok(Event::End(_)) => {
                    let elem = stack.pop().ok_or_else(|| {
                        IngestError::MalformedDocument("unbalanced closing tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, elem)?;
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| IngestError::MalformedDocument(e.to_string()))?
                        .into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Text(text));
                    }
                }
                Ok(Event::CData(c)) => {
                    let text = String::from_utf8_lossy(c.as_ref()).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Text(text));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {} // declaration, comments, processing instructions
                Err(e) => return Err(IngestError::MalformedDocument(e.to_string())),
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(IngestError::MalformedDocument(
                "unclosed element at end of document".to_string(),
            ));
        }

        root.ok_or_else(|| {
            IngestError::MalformedDocument("document has no root element".to_string())
        })
    }

    /// Value of an attribute on this element.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child element with the given tag name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children_named(name).next()
    }

    /// All direct child elements with the given tag name, in document order.
    pub fn children_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + use<'a, 'n> {
        self.elements().filter(move |e| e.name == name)
    }

    /// All direct child elements, in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Follows a chain of first-child lookups, e.g.
    /// `find(&["dmAddress", "dmIdent", "issueInfo"])`.
    pub fn find(&self, path: &[&str]) -> Option<&Element> {
        let mut current = self;
        for name in path {
            current = current.child(name)?;
        }
        Some(current)
    }

    /// All descendant elements with the given tag name, in document order.
    pub fn descendants_named<'a>(&'a self, name: &'a str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        collect_descendants(self, name, &mut out);
        out
    }

    /// Direct character data of this element, whitespace-trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let XmlNode::Text(t) = node {
                out.push_str(t);
            }
        }
        out.trim().to_string()
    }

    /// Deterministic re-serialization of this element and its subtree.
    pub fn to_xml(&self) -> String {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, self);
        String::from_utf8(writer.into_inner()).unwrap_or_default()
    }
}

fn collect_descendants<'a>(elem: &'a Element, name: &str, out: &mut Vec<&'a Element>) {
    for child in elem.elements() {
        if child.name == name {
            out.push(child);
        }
        collect_descendants(child, name, out);
    }
}

fn element_from_start(e: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut elem = Element::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| IngestError::MalformedDocument(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| IngestError::MalformedDocument(e.to_string()))?
            .into_owned();
        elem.attributes.push((key, value));
    }
    Ok(elem)
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, elem: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(elem));
    } else if root.is_none() {
        *root = Some(elem);
    } else {
        return Err(IngestError::MalformedDocument(
            "multiple root elements".to_string(),
        ));
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, elem: &Element) {
    let mut start = BytesStart::new(elem.name.as_str());
    for (k, v) in &elem.attributes {
        start.push_attribute((k.as_str(), v.as_str()));
    }

    if elem.children.is_empty() {
        let _ = writer.write_event(Event::Empty(start));
        return;
    }

    let _ = writer.write_event(Event::Start(start));
    for child in &elem.children {
        match child {
            XmlNode::Element(e) => write_element(writer, e),
            XmlNode::Text(t) => {
                let _ = writer.write_event(Event::Text(BytesText::new(t)));
            }
        }
    }
    let _ = writer.write_event(Event::End(quick_xml::events::BytesEnd::new(
        elem.name.as_str(),
    )));
}
