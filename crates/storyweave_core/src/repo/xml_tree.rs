//! Minimal element tree over `quick-xml` events.
//!
//! # Responsibility
//! - Parse a data-oriented XML document (no mixed content) into owned
//!   elements and serialize it back.
//! - Offer checked child lookups instead of panicking navigation.
//!
//! # Invariants
//! - Text and CDATA content of an element are concatenated into `text`.
//! - Whitespace-only text between markup is dropped; any other text is kept
//!   verbatim, surrounding whitespace included.
//! - Child order is document order and is preserved on write.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// XML parse or serialization failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlError(pub String);

impl Display for XmlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "xml error: {}", self.0)
    }
}

impl Error for XmlError {}

fn xml_error(err: impl Display) -> XmlError {
    XmlError(err.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Returns the named child, appending an empty one when missing.
    pub fn ensure_child(&mut self, name: &str) -> &mut Element {
        let index = match self.children.iter().position(|child| child.name == name) {
            Some(index) => index,
            None => {
                self.children.push(Element::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Text of the named child; `None` when the child does not exist.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|child| child.text.as_str())
    }

    /// Sets the text of the named child, creating it when missing.
    pub fn set_child_text(&mut self, name: &str, text: impl Into<String>) {
        let child = self.ensure_child(name);
        child.text = text.into();
        child.children.clear();
    }

    pub fn remove_children(&mut self, name: &str) {
        self.children.retain(|child| child.name != name);
    }

    /// Parses a whole document and returns its root element.
    ///
    /// # Errors
    /// - `XmlError` for malformed markup, bad escapes, or a missing root.
    pub fn parse(text: &str) -> Result<Element, XmlError> {
        let mut reader = Reader::from_str(text);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError("unexpected closing tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let value = text.unescape().map_err(xml_error)?;
                    if value.trim().is_empty() {
                        continue;
                    }
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&value);
                    }
                }
                Event::CData(data) => {
                    let bytes = data.into_inner();
                    let value = std::str::from_utf8(&bytes).map_err(xml_error)?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(value);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(XmlError("unclosed element at end of document".to_string()));
        }
        root.ok_or_else(|| XmlError("document has no root element".to_string()))
    }

    /// Serializes the element as a UTF-8 document with declaration.
    ///
    /// Text of elements named in `cdata_tags` is written unescaped inside
    /// CDATA sections; all other text is escaped.
    ///
    /// # Errors
    /// - `XmlError` when the writer fails.
    pub fn to_document(&self, cdata_tags: &[&str]) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_error)?;
        write_element(&mut writer, self, cdata_tags)?;
        String::from_utf8(writer.into_inner()).map_err(xml_error)
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        ..Element::default()
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(XmlError("multiple root elements".to_string())),
    }
    Ok(())
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
    cdata_tags: &[&str],
) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.text.is_empty() && element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(xml_error);
    }

    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    if !element.text.is_empty() {
        if cdata_tags.contains(&element.name.as_str()) {
            write_cdata(writer, &element.text)?;
        } else {
            writer
                .write_event(Event::Text(BytesText::new(&element.text)))
                .map_err(xml_error)?;
        }
    }
    for child in &element.children {
        write_element(writer, child, cdata_tags)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(xml_error)
}

/// Writes `text` as adjacent CDATA sections, splitting every `]]>` between
/// two sections so no section contains its own terminator.
fn write_cdata(writer: &mut Writer<Vec<u8>>, text: &str) -> Result<(), XmlError> {
    let mut rest = text;
    while let Some(index) = rest.find("]]>") {
        let (head, tail) = rest.split_at(index + 2);
        writer
            .write_event(Event::CData(BytesCData::new(head)))
            .map_err(xml_error)?;
        rest = tail;
    }
    writer
        .write_event(Event::CData(BytesCData::new(rest)))
        .map_err(xml_error)
}
