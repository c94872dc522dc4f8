//! Incremental element extractor
//!
//! Streams the decompressed XML and materializes one root-level entity
//! element at a time. Only the element currently being built is resident;
//! everything already yielded has been handed off to the caller, so peak
//! memory is bounded by one element regardless of dump size.
//!
//! Entity elements are captured only at depth 1 (direct children of the
//! root container). This is what keeps `<label>` elements nested inside
//! `<sublabels>` from being emitted as top-level records.

use std::io::{self, BufRead};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::errors::Result;
use crate::xml::XmlElement;

/// Lazy sequence of root-level elements matching a target tag.
pub struct ElementExtractor<R: BufRead> {
    reader: Reader<R>,
    target: &'static str,
    limit: Option<u64>,
    yielded: u64,
    depth: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> ElementExtractor<R> {
    /// Create an extractor over a decompressed byte stream.
    ///
    /// If `limit` is set, the extractor stops after yielding that many
    /// elements even when more input remains.
    pub fn new(stream: R, target: &'static str, limit: Option<u64>) -> Self {
        ElementExtractor {
            reader: Reader::from_reader(stream),
            target,
            limit,
            yielded: 0,
            depth: 0,
            buf: Vec::with_capacity(8 * 1024),
        }
    }

    /// Number of elements yielded so far.
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Advance to the next matching element, or `None` at end of input or
    /// once the limit is reached. Malformed XML is fatal.
    pub fn next_element(&mut self) -> Result<Option<XmlElement>> {
        if let Some(limit) = self.limit {
            if self.yielded >= limit {
                return Ok(None);
            }
        }

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(start) => {
                    if self.depth == 1 && start.name().as_ref() == self.target.as_bytes() {
                        let root = element_from_start(&start)?;
                        let elem = build_element(&mut self.reader, root)?;
                        self.yielded += 1;
                        return Ok(Some(elem));
                    }
                    self.depth += 1;
                }
                Event::Empty(start) => {
                    if self.depth == 1 && start.name().as_ref() == self.target.as_bytes() {
                        let elem = element_from_start(&start)?;
                        self.yielded += 1;
                        return Ok(Some(elem));
                    }
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement> {
    let mut elem = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(quick_xml::Error::from)?
            .into_owned();
        elem.attributes.push((key, value));
    }
    Ok(elem)
}

/// Consume events up to the end tag matching `root`, building the subtree.
fn build_element<R: BufRead>(reader: &mut Reader<R>, root: XmlElement) -> Result<XmlElement> {
    let mut stack = vec![root];
    let mut buf = Vec::with_capacity(4 * 1024);

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let child = element_from_start(&start)?;
                stack
                    .last_mut()
                    .expect("stack holds the element being built")
                    .children
                    .push(child);
            }
            Event::End(_) => {
                let done = stack.pop().expect("stack holds the element being built");
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => return Ok(done),
                }
            }
            Event::Text(text) => {
                let chunk = text.unescape()?;
                if !chunk.is_empty() {
                    stack
                        .last_mut()
                        .expect("stack holds the element being built")
                        .push_text(&chunk);
                }
            }
            Event::CData(data) => {
                let chunk = String::from_utf8_lossy(data.as_ref()).into_owned();
                stack
                    .last_mut()
                    .expect("stack holds the element being built")
                    .push_text(&chunk);
            }
            Event::Eof => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "unexpected end of XML input",
                )
                .into());
            }
            _ => {}
        }
    }
}

/// Parse a standalone XML fragment into an element tree. Test and tooling
/// helper; the pipeline always goes through [`ElementExtractor`].
pub fn parse_element_str(xml: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                let root = element_from_start(&start)?;
                return build_element(&mut reader, root);
            }
            Event::Empty(start) => return element_from_start(&start),
            Event::Eof => {
                return Err(
                    io::Error::new(io::ErrorKind::UnexpectedEof, "empty XML fragment").into(),
                );
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::ElementView;
    use std::io::Cursor;

    fn extract_all(xml: &str, tag: &'static str, limit: Option<u64>) -> Vec<XmlElement> {
        let mut extractor = ElementExtractor::new(Cursor::new(xml.to_string()), tag, limit);
        let mut elements = Vec::new();
        while let Some(elem) = extractor.next_element().unwrap() {
            elements.push(elem);
        }
        elements
    }

    #[test]
    fn test_yields_each_element() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<artists>
    <artist><id>1</id><name>One</name></artist>
    <artist><id>2</id><name>Two</name></artist>
</artists>"#;

        let elements = extract_all(xml, "artist", None);
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].find_text("id"), Some("1"));
        assert_eq!(elements[1].find_text("name"), Some("Two"));
    }

    #[test]
    fn test_limit_stops_early() {
        let xml = "<artists><artist/><artist/><artist/></artists>";
        let elements = extract_all(xml, "artist", Some(2));
        assert_eq!(elements.len(), 2);
    }

    #[test]
    fn test_nested_labels_are_not_emitted() {
        let xml = r#"<labels>
    <label><id>1</id><name>EMI</name>
        <sublabels><label id="10">Parlophone</label></sublabels>
    </label>
    <label><id>2</id><name>Columbia</name></label>
</labels>"#;

        let elements = extract_all(xml, "label", None);
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].find_text("id"), Some("1"));
        // the nested ref is still reachable inside the first element
        let sublabels = elements[0].find("sublabels").unwrap();
        assert_eq!(sublabels.find_all("label").len(), 1);
    }

    #[test]
    fn test_attributes_and_text() {
        let xml = r#"<masters><master id="99"><title>S &amp; M</title></master></masters>"#;
        let elements = extract_all(xml, "master", None);
        assert_eq!(elements[0].attr("id"), Some("99"));
        assert_eq!(elements[0].find_text("title"), Some("S & M"));
    }

    #[test]
    fn test_self_closing_entity_element() {
        let xml = r#"<releases><release id="7"/></releases>"#;
        let elements = extract_all(xml, "release", None);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].attr("id"), Some("7"));
    }

    #[test]
    fn test_malformed_xml_is_fatal() {
        let xml = "<artists><artist><id>1</artist></artists>";
        let mut extractor = ElementExtractor::new(Cursor::new(xml.to_string()), "artist", None);
        assert!(extractor.next_element().is_err());
    }

    #[test]
    fn test_parse_element_str() {
        let elem = parse_element_str("<artist><id>5</id></artist>").unwrap();
        assert_eq!(elem.tag(), "artist");
        assert_eq!(elem.find_text("id"), Some("5"));
    }

    #[test]
    fn test_serialize_round_trip() {
        let xml = r#"<artist id="45"><name>Mott &amp; Hoople</name><urls><url>http://x</url></urls><images/></artist>"#;
        let elem = parse_element_str(xml).unwrap();

        let mut out = Vec::new();
        elem.write_xml(&mut out).unwrap();
        let reparsed = parse_element_str(std::str::from_utf8(&out).unwrap()).unwrap();
        assert_eq!(elem, reparsed);
    }
}
