//! Transformed output as a node tree
//!
//! The analyzer works on four node categories: elements, attributes, text
//! and data. Data nodes hold content that a browser does not treat as markup
//! text, i.e. the bodies of `script` and `style` elements and CDATA sections.

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

/// Elements whose content is data rather than text
const DATA_ELEMENTS: &[&str] = &["script", "style"];

/// HTML elements that never have an end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Element of the output tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name as written
    pub name: String,
    /// Attributes in document order
    pub attributes: IndexMap<String, String>,
    /// Child nodes
    pub children: Vec<Node>,
}

impl Element {
    /// Create an element without attributes or children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Add a child node
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Whether the tag name matches, ignoring ASCII case
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Attribute value by name, ignoring ASCII case
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Child elements in order
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Concatenated text and data of the direct children
    pub fn own_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                Node::Text(text) | Node::Data(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Whether this element is the content model of data nodes
    pub fn holds_data(&self) -> bool {
        DATA_ELEMENTS.iter().any(|name| self.is_named(name))
    }

    /// Find the first element in this subtree, including self, matching a predicate
    pub fn find(&self, predicate: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if predicate(self) {
            return Some(self);
        }
        self.child_elements().find_map(|child| child.find(predicate))
    }
}

/// Node of the output tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Element
    Element(Element),
    /// Character data rendered as text
    Text(String),
    /// Script or style body, or CDATA
    Data(String),
}

impl Node {
    /// The element, if this node is one
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// Parsed transform output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputDocument {
    /// Top level nodes
    pub children: Vec<Node>,
}

impl OutputDocument {
    /// Create a document from top level nodes
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// Top level elements in order
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Follow child element indices from the top level
    pub fn element_at(&self, indices: &[usize]) -> Option<&Element> {
        let (first, rest) = indices.split_first()?;
        let mut current = self.elements().nth(*first)?;
        for index in rest {
            current = current.child_elements().nth(*index)?;
        }
        Some(current)
    }
}

/// Turns transform output text into an [`OutputDocument`]
pub trait OutputParser: Send + Sync {
    /// Parse output text
    fn parse(&self, output: &str) -> Result<OutputDocument>;
}

/// Lenient parser for XHTML-like output.
///
/// End tags close the nearest matching open element, HTML void elements need
/// no end tag, valueless attributes are accepted and unknown entities are kept
/// as written. It is not an HTML5 parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct XhtmlOutputParser;

impl XhtmlOutputParser {
    /// Create a parser
    pub fn new() -> Self {
        Self
    }

    fn parse_element(start: &BytesStart<'_>) -> Result<Element> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| Error::OutputParse(format!("Invalid element name: {}", e)))?
            .to_string();
        let mut element = Element::new(name);

        for attr_result in start.html_attributes() {
            let attr = attr_result
                .map_err(|e| Error::OutputParse(format!("Failed to parse attribute: {}", e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = match attr.unescape_value() {
                Ok(value) => value.to_string(),
                Err(_) => String::from_utf8_lossy(&attr.value).to_string(),
            };
            element.attributes.insert(key, value);
        }

        Ok(element)
    }

    fn is_void(element: &Element) -> bool {
        VOID_ELEMENTS.iter().any(|name| element.is_named(name))
    }
}

fn attach(stack: &mut [Element], top: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top.push(node),
    }
}

fn close(stack: &mut Vec<Element>, top: &mut Vec<Node>) {
    if let Some(element) = stack.pop() {
        attach(stack, top, Node::Element(element));
    }
}

impl OutputParser for XhtmlOutputParser {
    fn parse(&self, output: &str) -> Result<OutputDocument> {
        let mut reader = Reader::from_str(output);
        reader.check_end_names(false);

        let mut top: Vec<Node> = Vec::new();
        let mut stack: Vec<Element> = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let element = Self::parse_element(&e)?;
                    if Self::is_void(&element) {
                        attach(&mut stack, &mut top, Node::Element(element));
                    } else {
                        stack.push(element);
                    }
                }
                Ok(Event::Empty(e)) => {
                    let element = Self::parse_element(&e)?;
                    attach(&mut stack, &mut top, Node::Element(element));
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    // Unmatched end tags are dropped
                    if let Some(depth) = stack.iter().rposition(|el| el.is_named(&name)) {
                        while stack.len() > depth {
                            close(&mut stack, &mut top);
                        }
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = match e.unescape() {
                        Ok(text) => text.to_string(),
                        Err(_) => String::from_utf8_lossy(&e).to_string(),
                    };
                    if text.trim().is_empty() {
                        continue;
                    }
                    let node = match stack.last() {
                        Some(parent) if parent.holds_data() => Node::Data(text),
                        _ => Node::Text(text),
                    };
                    attach(&mut stack, &mut top, node);
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e).to_string();
                    attach(&mut stack, &mut top, Node::Data(text));
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::OutputParse(format!(
                        "Error parsing output at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {} // Declarations, comments, processing instructions, doctype
            }
        }

        while !stack.is_empty() {
            close(&mut stack, &mut top);
        }

        Ok(OutputDocument::new(top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(output: &str) -> OutputDocument {
        XhtmlOutputParser::new().parse(output).unwrap()
    }

    #[test]
    fn test_parse_simple_output() {
        let doc = parse(r#"<html><body><div class="x">hello</div></body></html>"#);
        let div = doc.element_at(&[0, 0, 0]).unwrap();
        assert_eq!(div.name, "div");
        assert_eq!(div.attribute("CLASS"), Some("x"));
        assert_eq!(div.children, vec![Node::Text("hello".to_string())]);
    }

    #[test]
    fn test_script_and_style_are_data() {
        let doc = parse("<html><script>var a = 1;</script><style>p{}</style><p><![CDATA[raw]]></p></html>");
        let html = doc.element_at(&[0]).unwrap();
        let kinds: Vec<_> = html
            .child_elements()
            .map(|e| e.children.clone())
            .collect();
        assert_eq!(kinds[0], vec![Node::Data("var a = 1;".to_string())]);
        assert_eq!(kinds[1], vec![Node::Data("p{}".to_string())]);
        assert_eq!(kinds[2], vec![Node::Data("raw".to_string())]);
    }

    #[test]
    fn test_lenient_html() {
        let doc = parse(r#"<!DOCTYPE html><html><body><br><input disabled value=x><p>a &nbsp; b</p></span></body></html>"#);
        let body = doc.element_at(&[0, 0]).unwrap();
        let names: Vec<_> = body.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["br", "input", "p"]);
        assert_eq!(body.child_elements().nth(1).unwrap().attribute("disabled"), Some(""));
        assert_eq!(body.child_elements().nth(2).unwrap().own_text(), "a &nbsp; b");
    }

    #[test]
    fn test_unclosed_elements_are_closed_at_end() {
        let doc = parse("<div><p>one");
        let p = doc.element_at(&[0, 0]).unwrap();
        assert_eq!(p.own_text(), "one");
        assert!(doc.element_at(&[0, 1]).is_none());
        assert!(doc.element_at(&[]).is_none());
    }

    #[test]
    fn test_find_in_subtree() {
        let doc = parse("<div><p><b>x</b></p></div>");
        let div = doc.element_at(&[0]).unwrap();
        assert!(div.find(&|e| e.is_named("B")).is_some());
        assert!(div.find(&|e| e.is_named("i")).is_none());
    }
}
