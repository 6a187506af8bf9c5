//! Owned XML element tree built from a quick-xml event stream
//!
//! The normalizer needs document-order descendant searches over tag names,
//! including fallback chains across several candidate tags, which is awkward
//! against a streaming reader. This module materializes the document into a
//! small owned tree with the handful of lookups normalization actually uses.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use sha2::{Digest, Sha256};

use crate::error::ParseError;

/// One parsed XML element
#[derive(Debug, Clone, Default)]
pub struct Element {
    /// Tag name as written, prefix included
    pub tag: String,
    /// Attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Concatenated trimmed text content
    pub text: String,
    /// Child elements in document order
    pub children: Vec<Element>,
}

impl Element {
    /// Attribute value by exact name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First direct child with the given tag
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|e| e.tag == tag)
    }

    /// First descendant with the given tag, document order, self excluded
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.descendants().find(|e| e.tag == tag)
    }

    /// All descendants in document order, self excluded
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// Short structural hash over tag names, attributes and text.
    ///
    /// Used to synthesize stable placeholder names for entries that carry no
    /// usable NAME anywhere in their subtree.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        self.hash_into(&mut hasher);
        hasher
            .finalize()
            .iter()
            .take(4)
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    fn hash_into(&self, hasher: &mut Sha256) {
        hasher.update(self.tag.as_bytes());
        for (key, value) in &self.attributes {
            hasher.update(key.as_bytes());
            hasher.update(value.as_bytes());
        }
        hasher.update(self.text.as_bytes());
        for child in &self.children {
            child.hash_into(hasher);
        }
    }
}

/// Pre-order depth-first iterator over an element's descendants
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<&'a Element> {
        let element = self.stack.pop()?;
        for child in element.children.iter().rev() {
            self.stack.push(child);
        }
        Some(element)
    }
}

/// Parse a full XML document into a synthetic root element.
///
/// The returned element has the pseudo-tag `#document` and holds every
/// top-level element as a child, so descendant searches span the whole
/// document regardless of how many roots the upstream response has.
pub fn parse_document(xml: &str) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut root = Element {
        tag: "#document".to_string(),
        ..Default::default()
    };
    let mut stack: Vec<Element> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                stack.push(element_from_start(&start));
            }
            Event::Empty(start) => {
                let element = element_from_start(&start);
                attach(&mut root, &mut stack, element);
            }
            Event::End(_) => {
                let element = stack.pop().ok_or(ParseError::UnbalancedClose)?;
                attach(&mut root, &mut stack, element);
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    push_text(top, &text.unescape()?);
                }
            }
            Event::CData(cdata) => {
                if let Some(top) = stack.last_mut() {
                    let raw = cdata.into_inner();
                    push_text(top, &String::from_utf8_lossy(&raw));
                }
            }
            Event::Eof => break,
            // declarations, comments, processing instructions, doctypes
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::UnclosedElement {
            tag: open.tag.clone(),
        });
    }

    Ok(root)
}

fn element_from_start(start: &BytesStart<'_>) -> Element {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();

    for attr in start.attributes() {
        match attr {
            Ok(attr) => {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = attr
                    .unescape_value()
                    .map(|v| v.into_owned())
                    .unwrap_or_default();
                attributes.push((key, value));
            }
            Err(e) => {
                log::debug!("skipping malformed attribute on <{}>: {}", tag, e);
            }
        }
    }

    Element {
        tag,
        attributes,
        text: String::new(),
        children: Vec::new(),
    }
}

fn attach(root: &mut Element, stack: &mut [Element], element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => root.children.push(element),
    }
}

fn push_text(element: &mut Element, text: &str) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    if !element.text.is_empty() {
        element.text.push(' ');
    }
    element.text.push_str(trimmed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_tree() {
        let root = parse_document("<A><B>hello</B><C x=\"1\"/></A>").unwrap();
        assert_eq!(root.children.len(), 1);
        let a = &root.children[0];
        assert_eq!(a.tag, "A");
        assert_eq!(a.child("B").unwrap().text, "hello");
        assert_eq!(a.child("C").unwrap().attr("x"), Some("1"));
    }

    #[test]
    fn test_find_is_document_order() {
        let root = parse_document("<A><B><N>deep</N></B><N>shallow</N></A>").unwrap();
        assert_eq!(root.find("N").unwrap().text, "deep");
    }

    #[test]
    fn test_descendants_excludes_self() {
        let root = parse_document("<A><B/><C><D/></C></A>").unwrap();
        let a = &root.children[0];
        let tags: Vec<&str> = a.descendants().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["B", "C", "D"]);
    }

    #[test]
    fn test_mismatched_tags_fail() {
        assert!(parse_document("<A><B></A></B>").is_err());
        assert!(parse_document("<A>").is_err());
    }

    #[test]
    fn test_entity_unescaping() {
        let root = parse_document("<A>R&amp;D</A>").unwrap();
        assert_eq!(root.children[0].text, "R&D");
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = parse_document("<A><B>x</B></A>").unwrap();
        let b = parse_document("<A><B>x</B></A>").unwrap();
        let c = parse_document("<A><B>y</B></A>").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 8);
    }
}
