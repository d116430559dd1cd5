//! Minimal owned XML element tree built on `quick-xml` events.
//!
//! BGG endpoints describe the same logical field in several shapes
//! (attribute vs. text vs. nested block), so responses are kept as a
//! generic tree and interpreted by the extraction rules in `extract`.

use std::borrow::Cow;
use std::str::FromStr;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

/// XML parse failure.
#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum XmlError {
    /// Tokenizer error from `quick-xml` (unbalanced tags, bad syntax, ...).
    #[error("XML syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),
    /// Element names, attributes or text were not valid UTF-8.
    #[error("invalid UTF-8 in XML document: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// Structurally invalid input that the tokenizer accepted.
    #[error("malformed XML: {0}")]
    Malformed(String),
    /// The document contains no element at all.
    #[error("XML document has no root element")]
    NoRoot,
}

/// An XML element with its attributes, children and concatenated text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    /// Creates an empty element named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds an attribute (builder style, used by tests and fixtures).
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Appends a child element (builder style).
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Sets the text content (builder style).
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Element name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value by key.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value parsed as `T`; `None` if missing or unparsable.
    #[must_use]
    pub fn attr_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.attr(key).and_then(|v| v.trim().parse().ok())
    }

    /// Trimmed text content, `None` when empty.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// All child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = &Self> {
        self.children.iter()
    }

    /// Child elements named `name`.
    pub fn children_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a Self> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First child named `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First child named `name` whose attribute `key` equals `value`.
    #[must_use]
    pub fn child_with_attr(&self, name: &str, key: &str, value: &str) -> Option<&Self> {
        self.children
            .iter()
            .find(|c| c.name == name && c.attr(key) == Some(value))
    }

    /// Follows a `/`-separated path of child names (first match at each step).
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Self> {
        path.split('/')
            .filter(|seg| !seg.is_empty())
            .try_fold(self, |el, seg| el.child(seg))
    }

    /// Depth-first search of the descendants (not `self`) for an element
    /// named `name` whose attribute `key` equals `value`.
    #[must_use]
    pub fn find_descendant(&self, name: &str, key: &str, value: &str) -> Option<&Self> {
        self.children.iter().find_map(|c| {
            if c.name == name && c.attr(key) == Some(value) {
                Some(c)
            } else {
                c.find_descendant(name, key, value)
            }
        })
    }
}

/// Parses a complete XML document into its root [`Element`].
///
/// # Errors
///
/// Returns [`XmlError`] for syntax errors, unclosed elements, invalid
/// UTF-8, or a document without any element.
pub fn parse_document(bytes: &[u8]) -> Result<Element, XmlError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => stack.push(open_element(&start)?),
            Event::Empty(start) => {
                let element = open_element(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| XmlError::Malformed(String::from("unexpected end tag")))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let raw = std::str::from_utf8(&text)?;
                    top.text.push_str(&unescape_text(raw));
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(std::str::from_utf8(&data)?);
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(top) = stack.last_mut() {
                    let name = std::str::from_utf8(&reference)?;
                    top.text.push_str(&resolve_reference(name));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(unclosed) = stack.last() {
        return Err(XmlError::Malformed(format!(
            "element <{}> is not closed",
            unclosed.name
        )));
    }
    root.ok_or(XmlError::NoRoot)
}

/// Builds an element (name + attributes) from a start tag.
fn open_element(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())?.to_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Malformed(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_owned();
        let raw = std::str::from_utf8(&attr.value)?;
        attributes.push((key, unescape_text(raw).into_owned()));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

/// Attaches a finished element to its parent, or makes it the root.
fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(XmlError::Malformed(String::from(
            "document has more than one root element",
        )));
    }
    *root = Some(element);
    Ok(())
}

/// Unescapes entity references; leaves the input untouched if it is not valid escaped text.
fn unescape_text(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Resolves a general entity reference (`amp`, `#39`, `#x27`, ...).
fn resolve_reference(name: &str) -> String {
    if let Some(code) = name.strip_prefix('#') {
        let parsed = code.strip_prefix('x').map_or_else(
            || code.parse::<u32>().ok(),
            |hex| u32::from_str_radix(hex, 16).ok(),
        );
        if let Some(c) = parsed.and_then(char::from_u32) {
            return c.to_string();
        }
    } else if let Some(resolved) = quick_xml::escape::resolve_predefined_entity(name) {
        return String::from(resolved);
    }
    format!("&{name};")
}
