//! Minimal mutable XML element tree
//!
//! Domain descriptions are treated as opaque structured text: we keep
//! element names, attribute order, child order and text content, and drop
//! the prolog (declaration, doctype, processing instructions). Parsing and
//! serialization go through quick-xml's event API.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

const INDENT: &str = "  ";

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Failed to parse XML: {0}")]
    ParseError(String),
    #[error("Failed to serialize XML: {0}")]
    SerializeError(String),
}

fn parse_error(e: impl std::fmt::Display) -> XmlError {
    XmlError::ParseError(e.to_string())
}

fn serialize_error(e: impl std::fmt::Display) -> XmlError {
    XmlError::SerializeError(e.to_string())
}

/// Content of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

/// An XML element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Parse a document (or fragment with a single root) into its root element
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().check_end_names = true;

        // Open elements, innermost last
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                parse_error(format!("{} at position {}", e, reader.buffer_position()))
            })?;

            match event {
                Event::Start(start) => {
                    let element = element_from_start(&reader, &start)?;
                    if stack.is_empty() && root.is_some() {
                        return Err(parse_error(format!(
                            "unexpected second root element <{}>",
                            element.name
                        )));
                    }
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&reader, &start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    // End names are checked by the reader
                    let element = stack
                        .pop()
                        .ok_or_else(|| parse_error("unexpected closing tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(parse_error)?;
                    push_text(&mut stack, &text)?;
                }
                Event::CData(cdata) => {
                    let text = reader.decoder().decode(&cdata).map_err(parse_error)?;
                    push_text(&mut stack, &text)?;
                }
                Event::Comment(comment) => {
                    let text = reader.decoder().decode(&comment).map_err(parse_error)?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Comment(text.into_owned()));
                    }
                }
                Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        if let Some(open) = stack.last() {
            return Err(parse_error(format!("unclosed element <{}>", open.name)));
        }
        root.ok_or_else(|| parse_error("document has no root element"))
    }

    /// Parse raw document bytes, which must be UTF-8
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, XmlError> {
        let xml = std::str::from_utf8(bytes)
            .map_err(|e| parse_error(format!("content is not valid UTF-8: {}", e)))?;
        Self::parse(xml)
    }

    /// Serialize with an XML declaration, without touching whitespace
    pub fn to_xml(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(serialize_error)?;
        writer.get_mut().push(b'\n');
        write_element(&mut writer, self)?;
        String::from_utf8(writer.into_inner()).map_err(serialize_error)
    }

    /// Serialize this element alone, without an XML declaration
    pub fn to_fragment(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, self)?;
        String::from_utf8(writer.into_inner()).map_err(serialize_error)
    }

    /// Serialize a normalized (indented) copy
    pub fn to_pretty_xml(&self) -> Result<String, XmlError> {
        let mut normalized = self.clone();
        indent(&mut normalized, 0);
        normalized.to_xml()
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing it in place if it already exists
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First child element with the given name
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.child_elements_mut().find(|e| e.name == name)
    }

    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements().filter(move |e| e.name == name)
    }

    /// Concatenated direct text content, `None` if there is none
    pub fn text(&self) -> Option<String> {
        let mut text = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                text.push_str(t);
            }
        }
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Replace direct text content, keeping child elements
    pub fn set_text(&mut self, text: &str) {
        self.children.retain(|node| !matches!(node, Node::Text(_)));
        self.children.insert(0, Node::Text(text.to_string()));
    }

    pub fn push_child(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }
}

fn element_from_start(reader: &Reader<&[u8]>, start: &BytesStart) -> Result<Element, XmlError> {
    let name = reader
        .decoder()
        .decode(start.name().as_ref())
        .map_err(parse_error)?
        .into_owned();

    let mut element = Element::new(&name);
    for attr in start.attributes() {
        let attr = attr.map_err(parse_error)?;
        let key = reader
            .decoder()
            .decode(attr.key.as_ref())
            .map_err(parse_error)?
            .into_owned();
        let value = attr.unescape_value().map_err(parse_error)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.push_child(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(parse_error(format!(
                "unexpected second root element <{}>",
                element.name
            )))
        }
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: &str) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            // Merge with a preceding text node so CDATA and text stay one run
            if let Some(Node::Text(prev)) = parent.children.last_mut() {
                prev.push_str(text);
            } else {
                parent.children.push(Node::Text(text.to_string()));
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(parse_error(format!(
            "text outside of root element: {:?}",
            text.trim()
        ))),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(serialize_error);
    }

    writer
        .write_event(Event::Start(start))
        .map_err(serialize_error)?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(serialize_error)?,
            Node::Comment(text) => writer
                .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                .map_err(serialize_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(serialize_error)
}

/// Normalize whitespace between child elements.
///
/// Elements that contain other elements get one child per line, indented by
/// two spaces per level; whitespace-only text runs are replaced and any
/// other text is left where it was. Leaf elements are untouched.
pub fn indent(element: &mut Element, level: usize) {
    let has_structure = element
        .children
        .iter()
        .any(|node| !matches!(node, Node::Text(_)));
    if !has_structure {
        return;
    }

    let inner = format!("\n{}", INDENT.repeat(level + 1));
    let outer = format!("\n{}", INDENT.repeat(level));

    let children = std::mem::take(&mut element.children);
    for child in children {
        match child {
            Node::Text(text) if text.trim().is_empty() => {}
            Node::Text(text) => element.children.push(Node::Text(text)),
            mut node => {
                if let Node::Element(ref mut child) = node {
                    indent(child, level + 1);
                }
                element.children.push(Node::Text(inner.clone()));
                element.children.push(node);
            }
        }
    }
    element.children.push(Node::Text(outer));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_elements_attributes_text() {
        let xml = r#"<?xml version="1.0"?>
<domain type="kvm" id="1">
    <name>testVm</name>
    <devices>
        <disk device="disk" type="file"><serial>virtio0000</serial></disk>
        <sound model="ac97"/>
    </devices>
</domain>"#;

        let root = Element::parse(xml).unwrap();
        assert_eq!(root.name, "domain");
        assert_eq!(root.attr("type"), Some("kvm"));
        assert_eq!(root.attr("id"), Some("1"));
        assert_eq!(root.find("name").unwrap().text().as_deref(), Some("testVm"));

        let devices = root.find("devices").unwrap();
        let names: Vec<&str> = devices.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["disk", "sound"]);

        let disk = devices.find("disk").unwrap();
        assert_eq!(disk.find("serial").unwrap().text().as_deref(), Some("virtio0000"));
    }

    #[test]
    fn test_parse_unescapes_and_cdata() {
        let root = Element::parse(r#"<a note="x &amp; y">1 &lt; 2<![CDATA[ & 3]]></a>"#).unwrap();
        assert_eq!(root.attr("note"), Some("x & y"));
        assert_eq!(root.text().as_deref(), Some("1 < 2 & 3"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Element::parse("").is_err());
        assert!(Element::parse("<domain>").is_err());
        assert!(Element::parse("<domain></devices>").is_err());
        assert!(Element::parse("<a/><b/>").is_err());
        assert!(Element::parse("<a/>trailing").is_err());
    }

    #[test]
    fn test_parse_bytes_rejects_non_utf8() {
        let latin1: &[u8] = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><domain><name>caf\xE9</name></domain>";
        assert!(matches!(
            Element::parse_bytes(latin1),
            Err(XmlError::ParseError(_))
        ));

        let root = Element::parse_bytes("<name>café</name>".as_bytes()).unwrap();
        assert_eq!(root.text().as_deref(), Some("café"));
    }

    #[test]
    fn test_serialize_escapes() {
        let mut root = Element::new("a");
        root.set_attr("note", "x & \"y\"");
        root.set_text("1 < 2");

        let xml = root.to_xml().unwrap();
        let reparsed = Element::parse(&xml).unwrap();
        assert_eq!(reparsed, root);
    }

    #[test]
    fn test_indent_normalizes_whitespace() {
        let compact = Element::parse("<domain><devices><disk/></devices><name>vm</name></domain>")
            .unwrap();
        let spaced = Element::parse(
            "<domain>\n\t<devices>   <disk />\n</devices>\n<name>vm</name>  </domain>",
        )
        .unwrap();

        let expected = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
<domain>\n  <devices>\n    <disk/>\n  </devices>\n  <name>vm</name>\n</domain>";
        assert_eq!(compact.to_pretty_xml().unwrap(), expected);
        assert_eq!(spaced.to_pretty_xml().unwrap(), expected);
    }

    #[test]
    fn test_indent_keeps_comments_and_mixed_text() {
        let mut root = Element::parse("<a><!-- note --><b/>tail</a>").unwrap();
        indent(&mut root, 0);

        assert!(root.children.contains(&Node::Comment(" note ".to_string())));
        assert!(root.children.contains(&Node::Text("tail".to_string())));
    }

    #[test]
    fn test_fragment_has_no_declaration() {
        let e = Element::parse(r#"<serial>virtio0000</serial>"#).unwrap();
        assert_eq!(e.to_fragment().unwrap(), "<serial>virtio0000</serial>");
    }

    #[test]
    fn test_set_attr_replaces_in_place() {
        let mut e = Element::parse(r#"<alias name="ua-0" extra="1"/>"#).unwrap();
        e.set_attr("name", "ua-1");
        assert_eq!(
            e.attributes,
            vec![
                ("name".to_string(), "ua-1".to_string()),
                ("extra".to_string(), "1".to_string()),
            ]
        );
    }
}
