//! Strict-mode access tracking
//!
//! [`TrackingElement`] wraps an element tree and records which child tags,
//! attributes and text were consulted while a parser ran. Afterwards
//! [`TrackingElement::unaccessed`] reports everything that exists in the
//! XML but was never read, as slash-joined paths. This is what powers
//! `--strict`: a non-empty report means the parser is dropping data.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashSet};

use crate::xml::{ElementView, XmlElement};

/// Transparent access-recording wrapper over an [`XmlElement`].
///
/// The whole subtree is wrapped up front, one wrapper per node, so state
/// accumulates no matter how often a child is looked up. A child only
/// contributes to the report once it has been *reached* through `find`,
/// `find_all` or iteration; `find_text` reads a child's text without
/// reaching it, mirroring how much of the element it actually exposes.
pub struct TrackingElement<'a> {
    elem: &'a XmlElement,
    reached: Cell<bool>,
    accessed_text: Cell<bool>,
    accessed_tags: RefCell<HashSet<String>>,
    accessed_attrs: RefCell<HashSet<String>>,
    children: Vec<TrackingElement<'a>>,
}

impl<'a> TrackingElement<'a> {
    /// Wrap an element for one parse. Wrappers are never shared between
    /// elements; each element gets a fresh one.
    pub fn new(elem: &'a XmlElement) -> Self {
        let wrapper = Self::wrap(elem);
        wrapper.reached.set(true);
        wrapper
    }

    fn wrap(elem: &'a XmlElement) -> Self {
        TrackingElement {
            elem,
            reached: Cell::new(false),
            accessed_text: Cell::new(false),
            accessed_tags: RefCell::new(HashSet::new()),
            accessed_attrs: RefCell::new(HashSet::new()),
            children: elem.children.iter().map(Self::wrap).collect(),
        }
    }

    /// Paths of tags, attributes and text that exist but were never read.
    ///
    /// Attribute paths carry an `@` prefix; unread text of a leaf element
    /// reports as `#text`. Children that were never reached do not appear;
    /// reached-but-incompletely-read ones contribute their own paths.
    pub fn unaccessed(&self) -> BTreeSet<String> {
        let mut paths = BTreeSet::new();

        let accessed_tags = self.accessed_tags.borrow();
        for child in &self.elem.children {
            if !accessed_tags.contains(&child.tag) {
                paths.insert(child.tag.clone());
            }
        }

        let accessed_attrs = self.accessed_attrs.borrow();
        for (name, _) in &self.elem.attributes {
            if !accessed_attrs.contains(name) {
                paths.insert(format!("@{name}"));
            }
        }

        if !self.accessed_text.get()
            && self.elem.children.is_empty()
            && self
                .elem
                .text
                .as_deref()
                .is_some_and(|text| !text.trim().is_empty())
        {
            paths.insert("#text".to_string());
        }

        for child in &self.children {
            if child.reached.get() {
                for path in child.unaccessed() {
                    paths.insert(format!("{}/{}", child.elem.tag, path));
                }
            }
        }

        paths
    }
}

impl<'a> ElementView for TrackingElement<'a> {
    fn tag(&self) -> &str {
        &self.elem.tag
    }

    fn text(&self) -> Option<&str> {
        self.accessed_text.set(true);
        self.elem.text.as_deref()
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.accessed_attrs.borrow_mut().insert(name.to_string());
        self.elem.attr(name)
    }

    fn find(&self, tag: &str) -> Option<&Self> {
        self.accessed_tags.borrow_mut().insert(tag.to_string());
        let child = self.children.iter().find(|child| child.elem.tag == tag)?;
        child.reached.set(true);
        Some(child)
    }

    fn find_all(&self, tag: &str) -> Vec<&Self> {
        self.accessed_tags.borrow_mut().insert(tag.to_string());
        self.children
            .iter()
            .filter(|child| child.elem.tag == tag)
            .inspect(|child| child.reached.set(true))
            .collect()
    }

    fn find_text(&self, tag: &str) -> Option<&str> {
        self.accessed_tags.borrow_mut().insert(tag.to_string());
        self.elem.find_text(tag)
    }

    fn children(&self) -> Vec<&Self> {
        let mut accessed_tags = self.accessed_tags.borrow_mut();
        self.children
            .iter()
            .inspect(|child| {
                accessed_tags.insert(child.elem.tag.clone());
                child.reached.set(true);
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_element_str;

    fn paths(tracker: &TrackingElement<'_>) -> Vec<String> {
        tracker.unaccessed().into_iter().collect()
    }

    #[test]
    fn test_reports_untouched_child_and_attr() {
        let elem = parse_element_str(
            r#"<artist id="7"><name>X</name><unknown_field>x</unknown_field></artist>"#,
        )
        .unwrap();
        let tracker = TrackingElement::new(&elem);

        let _ = tracker.find_text("name");
        assert_eq!(paths(&tracker), vec!["@id", "unknown_field"]);
    }

    #[test]
    fn test_fully_read_element_reports_nothing() {
        let elem = parse_element_str(r#"<artist id="7"><name>X</name></artist>"#).unwrap();
        let tracker = TrackingElement::new(&elem);

        let _ = tracker.attr("id");
        let _ = tracker.find_text("name");
        assert!(tracker.unaccessed().is_empty());
    }

    #[test]
    fn test_leaf_text_reported_when_unread() {
        let elem = parse_element_str("<name>Unread</name>").unwrap();
        let tracker = TrackingElement::new(&elem);
        assert_eq!(paths(&tracker), vec!["#text"]);

        let _ = tracker.text();
        assert!(tracker.unaccessed().is_empty());
    }

    #[test]
    fn test_whitespace_text_is_ignored() {
        let elem = parse_element_str("<aliases>\n   \n</aliases>").unwrap();
        let tracker = TrackingElement::new(&elem);
        assert!(tracker.unaccessed().is_empty());
    }

    #[test]
    fn test_reached_child_reports_recursively() {
        let elem = parse_element_str(
            r#"<artist><aliases><name id="1">A</name></aliases></artist>"#,
        )
        .unwrap();
        let tracker = TrackingElement::new(&elem);

        // reach the container and its children but read nothing inside them
        let aliases = tracker.find("aliases").unwrap();
        let names = aliases.find_all("name");
        assert_eq!(names.len(), 1);

        assert_eq!(
            paths(&tracker),
            vec!["aliases/name/#text", "aliases/name/@id"]
        );

        // reading id and text clears the report
        let _ = names[0].attr("id");
        let _ = names[0].text();
        assert!(tracker.unaccessed().is_empty());
    }

    #[test]
    fn test_unreached_children_do_not_recurse() {
        let elem = parse_element_str(
            r#"<artist><aliases><name id="1">A</name></aliases><id>5</id></artist>"#,
        )
        .unwrap();
        let tracker = TrackingElement::new(&elem);

        // find_text on id reads the tag without wrapping deeper content;
        // aliases is never looked up at all
        let _ = tracker.find_text("id");
        assert_eq!(paths(&tracker), vec!["aliases"]);
    }

    #[test]
    fn test_find_text_does_not_reach_child() {
        let elem = parse_element_str(r#"<company><resource_url>u</resource_url></company>"#)
            .unwrap();
        let tracker = TrackingElement::new(&elem);

        let _ = tracker.find_text("resource_url");
        assert!(tracker.unaccessed().is_empty());
    }

    #[test]
    fn test_iteration_reaches_every_child() {
        let elem =
            parse_element_str(r#"<tracklist><track/><track/></tracklist>"#).unwrap();
        let tracker = TrackingElement::new(&elem);

        assert_eq!(tracker.children().len(), 2);
        assert!(tracker.unaccessed().is_empty());
    }
}
