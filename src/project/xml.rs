//! Minimal editable XML tree on top of `quick-xml` events.
//!
//! Keeps elements, attributes, text, comments and CDATA in document order
//! so that a descriptor can be read, edited and written back without
//! reformatting the parts that were not touched. Processing instructions
//! and DOCTYPEs are dropped.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::descriptor::DescriptorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    CData(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_text(name: &str, text: &str) -> Self {
        let mut element = Self::new(name);
        element.set_text(text);
        element
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    pub fn children_named<'a, 'n: 'a>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter_map(move |node| match node {
            Node::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    pub fn children_named_mut<'a, 'n: 'a>(
        &'a mut self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a mut Element> + 'a {
        self.children.iter_mut().filter_map(move |node| match node {
            Node::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    /// Concatenated text content, trimmed
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            match node {
                Node::Text(t) | Node::CData(t) => text.push_str(t),
                _ => {}
            }
        }
        text.trim().to_string()
    }

    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(Element::text)
    }

    pub fn set_text(&mut self, text: &str) {
        self.children = vec![Node::Text(text.to_string())];
    }

    /// Set the text of the first `name` child, appending one if missing
    pub fn set_child_text(&mut self, name: &str, text: &str) {
        self.child_or_insert(name).set_text(text);
    }

    pub fn child_or_insert(&mut self, name: &str) -> &mut Element {
        let index = match self.position_of(name) {
            Some(index) => index,
            None => {
                self.push(Element::new(name));
                self.children.len() - 1
            }
        };
        match &mut self.children[index] {
            Node::Element(element) => element,
            _ => unreachable!("position_of only returns element indices"),
        }
    }

    /// Replace the first child with the same name, or append
    pub fn replace_child(&mut self, child: Element) {
        match self.position_of(&child.name) {
            Some(index) => self.children[index] = Node::Element(child),
            None => self.push(child),
        }
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, Node::Element(element) if element.name == name))
    }
}

/// Parsed document: optional declaration, leading comments and one root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    declaration: bool,
    prolog: Vec<Node>,
    pub root: Element,
}

fn parse_error(reader: &Reader<&[u8]>, reason: impl std::fmt::Display) -> DescriptorError {
    DescriptorError::Parse(format!(
        "at byte {}: {}",
        reader.buffer_position(),
        reason
    ))
}

fn write_error(reason: impl std::fmt::Display) -> DescriptorError {
    DescriptorError::Write(reason.to_string())
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, DescriptorError> {
    let mut element = Element::new(&String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| DescriptorError::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| DescriptorError::Parse(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

impl XmlDocument {
    pub fn parse(content: &str) -> Result<Self, DescriptorError> {
        let mut reader = Reader::from_str(content);
        let mut stack: Vec<Element> = Vec::new();
        let mut prolog = Vec::new();
        let mut root: Option<Element> = None;
        let mut declaration = false;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| parse_error(&reader, e))?;

            let node = match event {
                Event::Decl(_) => {
                    declaration = true;
                    continue;
                }
                Event::Start(start) => {
                    stack.push(element_from(&start)?);
                    continue;
                }
                Event::Empty(start) => Node::Element(element_from(&start)?),
                Event::End(_) => match stack.pop() {
                    Some(element) => Node::Element(element),
                    None => return Err(parse_error(&reader, "unbalanced closing tag")),
                },
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| parse_error(&reader, e))?;
                    Node::Text(text.into_owned())
                }
                Event::CData(data) => Node::CData(String::from_utf8_lossy(&data).into_owned()),
                Event::Comment(comment) => {
                    Node::Comment(String::from_utf8_lossy(&comment).into_owned())
                }
                Event::Eof => break,
                _ => continue,
            };

            match (stack.last_mut(), node) {
                (Some(parent), node) => parent.children.push(node),
                (None, Node::Element(element)) => {
                    if root.is_some() {
                        return Err(parse_error(&reader, "more than one root element"));
                    }
                    root = Some(element);
                }
                (None, Node::Comment(comment)) if root.is_none() => {
                    prolog.push(Node::Comment(comment))
                }
                // Whitespace around the root element
                (None, _) => {}
            }
        }

        if !stack.is_empty() {
            return Err(parse_error(&reader, "unclosed element at end of input"));
        }
        let root = root.ok_or_else(|| parse_error(&reader, "no root element"))?;

        Ok(Self {
            declaration,
            prolog,
            root,
        })
    }

    pub fn to_xml(&self) -> Result<String, DescriptorError> {
        let mut writer = Writer::new(Vec::new());

        if self.declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
                .map_err(write_error)?;
            write_newline(&mut writer)?;
        }
        for node in &self.prolog {
            write_node(&mut writer, node)?;
            write_newline(&mut writer)?;
        }
        write_element(&mut writer, &self.root)?;
        write_newline(&mut writer)?;

        String::from_utf8(writer.into_inner()).map_err(write_error)
    }
}

fn write_newline(writer: &mut Writer<Vec<u8>>) -> Result<(), DescriptorError> {
    writer
        .write_event(Event::Text(BytesText::new("\n")))
        .map_err(write_error)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), DescriptorError> {
    match node {
        Node::Element(element) => write_element(writer, element),
        Node::Text(text) => writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_error),
        Node::Comment(comment) => writer
            .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
            .map_err(write_error),
        Node::CData(data) => writer
            .write_event(Event::CData(BytesCData::new(data.as_str())))
            .map_err(write_error),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), DescriptorError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(write_error);
    }

    writer
        .write_event(Event::Start(start))
        .map_err(write_error)?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_error)
}
