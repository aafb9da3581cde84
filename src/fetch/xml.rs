//! Minimal XML document tree for OpenRosa payloads (form lists, manifests,
//! submission responses).
//!
//! Parsing is strict about structure: exactly one root element, every element
//! closed, no stray text outside the root.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

/// Reasons an XML payload could not be turned into an [`XmlDocument`].
#[derive(Debug, Error)]
pub enum XmlParseError {
    /// The payload contained no root element (including an empty body).
    #[error("document has no root element")]
    NoRootElement,

    /// The payload is not valid UTF-8.
    #[error("document is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    /// The tokenizer rejected the input.
    #[error("malformed XML at byte {position}: {source}")]
    Syntax {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    /// Input ended while an element was still open.
    #[error("unexpected end of document: <{name}> is not closed")]
    UnclosedElement { name: String },

    /// A second top-level element followed the root.
    #[error("unexpected element <{name}> after the root element")]
    MultipleRoots { name: String },

    /// Non-whitespace text appeared outside the root element.
    #[error("unexpected text outside the root element")]
    TextOutsideRoot,
}

/// A child of an [`XmlElement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// One XML element with its attributes and children in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    fn new(name: String, attributes: Vec<(String, String)>) -> Self {
        Self {
            name,
            attributes,
            children: Vec::new(),
        }
    }

    /// Qualified name as written, e.g. `h:html`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without any namespace prefix.
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    /// Value of attribute `name`, matched on the qualified name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All attributes in document order.
    #[must_use]
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// All child nodes.
    #[must_use]
    pub fn nodes(&self) -> &[XmlNode] {
        &self.children
    }

    /// Child elements, skipping text.
    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element whose local name is `local_name`.
    #[must_use]
    pub fn child(&self, local_name: &str) -> Option<&XmlElement> {
        self.children()
            .find(|element| element.local_name() == local_name)
    }

    /// Concatenated direct text content.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }
}

/// A parsed XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    /// Parses a UTF-8 payload.
    ///
    /// # Errors
    ///
    /// Returns [`XmlParseError`] for empty input, invalid UTF-8, tokenizer
    /// errors and structural problems.
    pub fn parse(bytes: &[u8]) -> Result<Self, XmlParseError> {
        let text = std::str::from_utf8(bytes)?;
        Self::parse_str(text)
    }

    /// Parses an XML string.
    ///
    /// # Errors
    ///
    /// See [`XmlDocument::parse`].
    pub fn parse_str(text: &str) -> Result<Self, XmlParseError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut root: Option<XmlElement> = None;
        let mut stack: Vec<XmlElement> = Vec::new();

        loop {
            let event = reader.read_event().map_err(|source| XmlParseError::Syntax {
                position: reader.buffer_position(),
                source,
            })?;
            match event {
                Event::Eof => break,
                Event::Start(start) => {
                    let element = element_from(&start, &reader)?;
                    if stack.is_empty() && root.is_some() {
                        return Err(XmlParseError::MultipleRoots {
                            name: element.name,
                        });
                    }
                    stack.push(element);
                }
                Event::Empty(empty) => {
                    let element = element_from(&empty, &reader)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    // quick-xml checks end names, so the stack is never empty here.
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element)?;
                    }
                }
                Event::Text(text) => {
                    let content = text.unescape().map_err(|source| XmlParseError::Syntax {
                        position: reader.buffer_position(),
                        source,
                    })?;
                    push_text(&mut stack, &content)?;
                }
                Event::CData(cdata) => {
                    let content = String::from_utf8_lossy(&cdata);
                    push_text(&mut stack, &content)?;
                }
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlParseError::UnclosedElement { name: open.name });
        }
        root.map(|root| Self { root })
            .ok_or(XmlParseError::NoRootElement)
    }

    /// The root element.
    #[must_use]
    pub fn root(&self) -> &XmlElement {
        &self.root
    }
}

fn element_from(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<XmlElement, XmlParseError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| XmlParseError::Syntax {
            position: reader.buffer_position(),
            source: e.into(),
        })?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|source| XmlParseError::Syntax {
                position: reader.buffer_position(),
                source,
            })?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement::new(name, attributes))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(XmlParseError::MultipleRoots { name: element.name });
    }
    *root = Some(element);
    Ok(())
}

fn push_text(stack: &mut [XmlElement], content: &str) -> Result<(), XmlParseError> {
    match stack.last_mut() {
        Some(parent) => {
            if !content.is_empty() {
                parent.children.push(XmlNode::Text(content.to_string()));
            }
            Ok(())
        }
        None if content.trim().is_empty() => Ok(()),
        None => Err(XmlParseError::TextOutsideRoot),
    }
}
