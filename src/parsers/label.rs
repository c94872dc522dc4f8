//! Label parser

use crate::errors::Result;
use crate::models::{Label, LabelRef, Record};
use crate::xml::ElementView;

use super::{owned, parse_error, required_id, text_list};

pub(super) fn parse<E: ElementView>(elem: &E) -> Result<Vec<Record>> {
    // The id appears as an attribute in some dump vintages and as a child
    // element in others; accept either.
    let id_attr = elem.attr("id").filter(|id| !id.is_empty());
    let id_text = elem.find_text("id").filter(|id| !id.is_empty());
    let id = required_id(elem, "label", id_attr.or(id_text))?;

    let label = Label {
        id,
        name: owned(elem.find_text("name")),
        contact_info: owned(elem.find_text("contactinfo")),
        profile: owned(elem.find_text("profile")),
        data_quality: owned(elem.find_text("data_quality")),
        urls: text_list(elem.find("urls"), "url"),
        sub_labels: label_refs(elem, elem.find("sublabels"))?,
        parent_label: parent_label(elem)?,
    };

    Ok(vec![Record::Label(label)])
}

fn parent_label<E: ElementView>(elem: &E) -> Result<Option<LabelRef>> {
    let Some(parent_elem) = elem.find("parentLabel") else {
        return Ok(None);
    };
    let ref_id = parent_elem.attr("id").filter(|id| !id.is_empty());
    let name = parent_elem.text().filter(|name| !name.is_empty());
    match (ref_id, name) {
        (Some(ref_id), Some(name)) => {
            let id = ref_id.parse::<u64>().map_err(|_| {
                parse_error(elem, "label", format!("invalid parent label id: {ref_id:?}"))
            })?;
            Ok(Some(LabelRef {
                id,
                name: name.to_string(),
            }))
        }
        _ => Ok(None),
    }
}

/// Parse `<label id="..">text</label>` references under `<sublabels>`.
fn label_refs<E: ElementView>(elem: &E, parent: Option<&E>) -> Result<Vec<LabelRef>> {
    let Some(parent) = parent else {
        return Ok(Vec::new());
    };

    let mut refs = Vec::new();
    for label_elem in parent.find_all("label") {
        let ref_id = label_elem.attr("id").filter(|id| !id.is_empty());
        let name = label_elem.text().filter(|name| !name.is_empty());
        if let (Some(ref_id), Some(name)) = (ref_id, name) {
            let id = ref_id.parse::<u64>().map_err(|_| {
                parse_error(elem, "label", format!("invalid sublabel id: {ref_id:?}"))
            })?;
            refs.push(LabelRef {
                id,
                name: name.to_string(),
            });
        }
    }
    Ok(refs)
}
