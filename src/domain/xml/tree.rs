//! Minimal XML element tree built from `quick-xml` events.
//!
//! Keeps what Canonical XML needs and nothing else: qualified names as
//! written, namespace declarations per element, attribute values after
//! normalization and entity expansion, text (CDATA merged in as text) and
//! processing instructions. Comments are dropped.

use crate::infra::error::{NfseError, NfseResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;

/// A parsed document: the root element only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root: Element,
}

/// Child node of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    ProcessingInstruction { target: String, data: String },
}

/// Non-namespace attribute with its qualified name and normalized value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written, e.g. `infDPS` or `ds:Signature`.
    pub name: String,
    /// Declarations on this element: (prefix, uri), `""` prefix for default.
    pub namespaces: Vec<(String, String)>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    #[must_use]
    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        split_qname(&self.name).0
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Child elements in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First child element with the given local name.
    #[must_use]
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.local_name() == local_name)
    }

    /// Concatenated text of direct text children.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Split `prefix:local` into its parts; unprefixed names get `""`.
#[must_use]
pub fn split_qname(name: &str) -> (&str, &str) {
    match name.split_once(':') {
        Some((p, l)) => (p, l),
        None => ("", name),
    }
}

impl Document {
    /// Parse XML text into an element tree.
    pub fn parse(xml: &str) -> NfseResult<Self> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(element_from(&e)?),
                Event::Empty(e) => {
                    let element = element_from(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| NfseError::XmlError("unexpected end tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    let raw = String::from_utf8_lossy(&t);
                    match stack.last_mut() {
                        Some(parent) => {
                            let text = unescape(&normalize_line_endings(&raw))?;
                            parent.children.push(Node::Text(text));
                        }
                        None if raw.trim().is_empty() => {}
                        None => {
                            return Err(NfseError::XmlError(
                                "text content outside the root element".into(),
                            ))
                        }
                    }
                }
                Event::CData(c) => {
                    let parent = stack.last_mut().ok_or_else(|| {
                        NfseError::XmlError("CDATA outside the root element".into())
                    })?;
                    let raw = c.into_inner();
                    let text = normalize_line_endings(&String::from_utf8_lossy(&raw));
                    parent.children.push(Node::Text(text));
                }
                Event::PI(pi) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = String::from_utf8_lossy(&pi).into_owned();
                        let (target, data) = match raw.split_once(char::is_whitespace) {
                            Some((t, d)) => (t.to_string(), d.trim_start().to_string()),
                            None => (raw, String::new()),
                        };
                        parent
                            .children
                            .push(Node::ProcessingInstruction { target, data });
                    }
                }
                Event::Comment(_) | Event::Decl(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        if let Some(open) = stack.last() {
            return Err(NfseError::XmlError(format!(
                "unclosed element <{}>",
                open.name
            )));
        }
        root.map(|root| Document { root })
            .ok_or_else(|| NfseError::XmlError("document has no root element".into()))
    }

    /// Element at a child-index path from the root (`[]` is the root).
    #[must_use]
    pub fn element_at(&self, path: &[usize]) -> Option<&Element> {
        let mut current = &self.root;
        for &idx in path {
            current = match current.children.get(idx)? {
                Node::Element(e) => e,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Path of the first element (document order) matching `pred`.
    pub fn find_first(&self, pred: impl Fn(&Element) -> bool) -> Option<Vec<usize>> {
        fn walk(
            element: &Element,
            path: &mut Vec<usize>,
            pred: &dyn Fn(&Element) -> bool,
        ) -> bool {
            if pred(element) {
                return true;
            }
            for (idx, child) in element.children.iter().enumerate() {
                if let Node::Element(e) = child {
                    path.push(idx);
                    if walk(e, path, pred) {
                        return true;
                    }
                    path.pop();
                }
            }
            false
        }
        let mut path = Vec::new();
        walk(&self.root, &mut path, &pred).then_some(path)
    }

    /// Namespace declarations in scope at `path`, outermost first. Later
    /// entries shadow earlier ones with the same prefix.
    #[must_use]
    pub fn declarations_in_scope(&self, path: &[usize]) -> Vec<(String, String)> {
        let mut decls = self.root.namespaces.clone();
        let mut current = &self.root;
        for &idx in path {
            match current.children.get(idx) {
                Some(Node::Element(e)) => {
                    decls.extend(e.namespaces.iter().cloned());
                    current = e;
                }
                _ => break,
            }
        }
        decls
    }

    /// Namespace URI of the element at `path` (`""` when unqualified).
    #[must_use]
    pub fn namespace_of(&self, path: &[usize]) -> String {
        let Some(element) = self.element_at(path) else {
            return String::new();
        };
        let prefix = element.prefix();
        self.declarations_in_scope(path)
            .into_iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri)
            .unwrap_or_default()
    }

    /// Ancestors of `path`, root first, excluding the element itself.
    #[must_use]
    pub fn ancestors(&self, path: &[usize]) -> Vec<&Element> {
        (0..path.len())
            .filter_map(|depth| self.element_at(&path[..depth]))
            .collect()
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> NfseResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(element));
        Ok(())
    } else if root.is_some() {
        Err(NfseError::XmlError("multiple root elements".into()))
    } else {
        *root = Some(element);
        Ok(())
    }
}

fn element_from(start: &BytesStart<'_>) -> NfseResult<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut namespaces = Vec::new();
    let mut attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| NfseError::XmlError(format!("attribute error: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = unescape(&normalize_attribute_whitespace(&raw))?;
        if key == "xmlns" {
            namespaces.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            namespaces.push((prefix.to_string(), value));
        } else {
            attributes.push(Attribute { name: key, value });
        }
    }

    Ok(Element {
        name,
        namespaces,
        attributes,
        children: Vec::new(),
    })
}

fn unescape(raw: &str) -> NfseResult<String> {
    quick_xml::escape::unescape(raw)
        .map(Cow::into_owned)
        .map_err(|e| NfseError::XmlError(format!("bad entity reference: {e}")))
}

fn normalize_line_endings(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

// Literal whitespace in attribute values becomes a space; character
// references survive because unescaping happens afterwards.
fn normalize_attribute_whitespace(raw: &str) -> String {
    normalize_line_endings(raw).replace(['\t', '\n'], " ")
}
