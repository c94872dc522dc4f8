//! Owned XML element tree and the shared read-access trait
//!
//! The extractor materializes one root-level entity element at a time into
//! an [`XmlElement`]. Parsers never touch the raw event stream; they read
//! through [`ElementView`], which is also implemented by the strict-mode
//! tracking wrapper so the same parser code runs in both modes.

use std::io::{self, Write};

/// One materialized XML element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    /// Concatenated character data. `None` when the element had no text
    /// nodes at all, `Some("")` is not produced by the extractor but kept
    /// representable for round-trips.
    pub text: Option<String>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(tag: impl Into<String>) -> Self {
        XmlElement {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Append character data, creating the text node on first use.
    pub fn push_text(&mut self, chunk: &str) {
        match &mut self.text {
            Some(text) => text.push_str(chunk),
            None => self.text = Some(chunk.to_string()),
        }
    }

    /// Serialize this element back to XML, escaping text and attributes.
    /// Elements with no content are written self-closing.
    pub fn write_xml<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "<{}", self.tag)?;
        for (name, value) in &self.attributes {
            write!(out, " {}=\"{}\"", name, escape_attr(value))?;
        }
        if self.text.is_none() && self.children.is_empty() {
            return write!(out, "/>");
        }
        write!(out, ">")?;
        if let Some(text) = &self.text {
            write!(out, "{}", escape_text(text))?;
        }
        for child in &self.children {
            child.write_xml(out)?;
        }
        write!(out, "</{}>", self.tag)
    }
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// Read access to an element, shared between the raw tree and the
/// strict-mode tracking wrapper.
pub trait ElementView: Sized {
    /// Element tag name.
    fn tag(&self) -> &str;

    /// Raw character data of this element, if any.
    fn text(&self) -> Option<&str>;

    /// Attribute value by name.
    fn attr(&self, name: &str) -> Option<&str>;

    /// First child with the given tag.
    fn find(&self, tag: &str) -> Option<&Self>;

    /// All children with the given tag, in document order.
    fn find_all(&self, tag: &str) -> Vec<&Self>;

    /// Text of the first child with the given tag. A present child with no
    /// text yields `Some("")`, a missing child yields `None`.
    fn find_text(&self, tag: &str) -> Option<&str>;

    /// All children in document order.
    fn children(&self) -> Vec<&Self>;
}

impl ElementView for XmlElement {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn find(&self, tag: &str) -> Option<&Self> {
        self.children.iter().find(|child| child.tag == tag)
    }

    fn find_all(&self, tag: &str) -> Vec<&Self> {
        self.children
            .iter()
            .filter(|child| child.tag == tag)
            .collect()
    }

    fn find_text(&self, tag: &str) -> Option<&str> {
        self.find(tag)
            .map(|child| child.text.as_deref().unwrap_or(""))
    }

    fn children(&self) -> Vec<&Self> {
        self.children.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> XmlElement {
        let mut name = XmlElement::new("name");
        name.push_text("Aphex Twin");
        let mut empty = XmlElement::new("realname");
        empty.text = Some(String::new());
        let mut root = XmlElement::new("artist");
        root.attributes.push(("id".into(), "45".into()));
        root.children.push(name);
        root.children.push(empty);
        root
    }

    #[test]
    fn test_accessors() {
        let elem = sample();
        assert_eq!(elem.tag(), "artist");
        assert_eq!(elem.attr("id"), Some("45"));
        assert_eq!(elem.attr("missing"), None);
        assert_eq!(elem.find_text("name"), Some("Aphex Twin"));
        assert_eq!(elem.find_text("missing"), None);
        // present but empty child reads as ""
        assert_eq!(elem.find_text("realname"), Some(""));
        assert_eq!(elem.find_all("name").len(), 1);
        assert_eq!(elem.children().len(), 2);
    }

    #[test]
    fn test_write_xml_escapes() {
        let mut elem = XmlElement::new("name");
        elem.attributes.push(("id".into(), "a\"b".into()));
        elem.push_text("Mott & <Hoople>");

        let mut out = Vec::new();
        elem.write_xml(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<name id=\"a&quot;b\">Mott &amp; &lt;Hoople&gt;</name>"
        );
    }

    #[test]
    fn test_write_xml_self_closing() {
        let elem = XmlElement::new("images");
        let mut out = Vec::new();
        elem.write_xml(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<images/>");
    }
}
