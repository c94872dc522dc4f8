//! Entity parsers: one XML element in, typed records out
//!
//! One parser per entity, dispatched through [`EntityType::parse_element`].
//! A parse produces a sequence of records; today that is always a single
//! top-level record, but the signature leaves room for decomposition.
//!
//! Required-field policy: the entity id must be present and non-empty,
//! otherwise a parse error carrying the entity kind and a best-effort
//! identifier is returned. Numeric fields parse lazily: absent or empty
//! becomes `None`, present-but-invalid is an error.

mod artist;
mod label;
mod master;
mod release;

use std::str::FromStr;

use crate::entity::EntityType;
use crate::errors::{DumpError, Result};
use crate::models::Record;
use crate::xml::ElementView;

impl EntityType {
    /// Parse one element into records using this entity's parser.
    pub fn parse_element<E: ElementView>(self, elem: &E) -> Result<Vec<Record>> {
        match self {
            EntityType::Artists => artist::parse(elem),
            EntityType::Labels => label::parse(elem),
            EntityType::Masters => master::parse(elem),
            EntityType::Releases => release::parse(elem),
        }
    }
}

/// Best-effort identifier for error messages: the `<id>` child, the `id`
/// attribute, or `?`.
pub(crate) fn element_id<E: ElementView>(elem: &E) -> String {
    elem.find_text("id")
        .filter(|id| !id.is_empty())
        .or_else(|| elem.attr("id").filter(|id| !id.is_empty()))
        .unwrap_or("?")
        .to_string()
}

pub(crate) fn parse_error<E: ElementView>(
    elem: &E,
    entity: &'static str,
    message: impl Into<String>,
) -> DumpError {
    DumpError::Parse {
        entity,
        id: element_id(elem),
        message: message.into(),
    }
}

/// Parse a required entity id. Missing or empty fails.
pub(crate) fn required_id<E: ElementView>(
    elem: &E,
    entity: &'static str,
    value: Option<&str>,
) -> Result<u64> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| parse_error(elem, entity, "missing required id"))?;
    value
        .parse::<u64>()
        .map_err(|_| parse_error(elem, entity, format!("invalid id: {value:?}")))
}

/// Parse an optional numeric field. `None` and `""` become `None`;
/// anything else must parse.
pub(crate) fn optional_number<T, E>(
    elem: &E,
    entity: &'static str,
    field: &str,
    value: Option<&str>,
) -> Result<Option<T>>
where
    T: FromStr,
    E: ElementView,
{
    match value.filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| parse_error(elem, entity, format!("invalid {field}: {v:?}"))),
    }
}

pub(crate) fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// Collect the non-empty texts of `tag` children under an optional parent.
pub(crate) fn text_list<E: ElementView>(parent: Option<&E>, tag: &str) -> Vec<String> {
    let Some(parent) = parent else {
        return Vec::new();
    };
    parent
        .find_all(tag)
        .into_iter()
        .filter_map(|child| child.text())
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_element_str;

    #[test]
    fn test_element_id_prefers_child() {
        let elem = parse_element_str(r#"<artist id="2"><id>1</id></artist>"#).unwrap();
        assert_eq!(element_id(&elem), "1");

        let elem = parse_element_str(r#"<master id="2"/>"#).unwrap();
        assert_eq!(element_id(&elem), "2");

        let elem = parse_element_str("<artist/>").unwrap();
        assert_eq!(element_id(&elem), "?");
    }

    #[test]
    fn test_required_id_rejects_missing_and_empty() {
        let elem = parse_element_str("<artist><id></id></artist>").unwrap();
        assert!(required_id(&elem, "artist", elem.find_text("id")).is_err());
        assert!(required_id(&elem, "artist", None).is_err());
        assert_eq!(required_id(&elem, "artist", Some("12")).unwrap(), 12);
    }

    #[test]
    fn test_optional_number() {
        let elem = parse_element_str("<master/>").unwrap();
        assert_eq!(
            optional_number::<i32, _>(&elem, "master", "year", None).unwrap(),
            None
        );
        assert_eq!(
            optional_number::<i32, _>(&elem, "master", "year", Some("")).unwrap(),
            None
        );
        assert_eq!(
            optional_number::<i32, _>(&elem, "master", "year", Some("1969")).unwrap(),
            Some(1969)
        );
        assert!(optional_number::<i32, _>(&elem, "master", "year", Some("196X")).is_err());
    }

    #[test]
    fn test_text_list_skips_empty_entries() {
        let elem = parse_element_str(
            "<urls><url>http://a</url><url></url><url>http://b</url></urls>",
        )
        .unwrap();
        assert_eq!(
            text_list(Some(&elem), "url"),
            vec!["http://a".to_string(), "http://b".to_string()]
        );
        assert!(text_list::<crate::xml::XmlElement>(None, "url").is_empty());
    }
}
