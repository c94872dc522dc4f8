//! Artist parser

use crate::errors::Result;
use crate::models::{Artist, ArtistRef, Record};
use crate::xml::ElementView;

use super::{owned, parse_error, required_id, text_list};

pub(super) fn parse<E: ElementView>(elem: &E) -> Result<Vec<Record>> {
    let id = required_id(elem, "artist", elem.find_text("id"))?;

    let artist = Artist {
        id,
        name: owned(elem.find_text("name")),
        real_name: owned(elem.find_text("realname")),
        profile: owned(elem.find_text("profile")),
        data_quality: owned(elem.find_text("data_quality")),
        urls: text_list(elem.find("urls"), "url"),
        name_variations: text_list(elem.find("namevariations"), "name"),
        aliases: artist_refs(elem, elem.find("aliases"))?,
        members: artist_refs(elem, elem.find("members"))?,
        groups: artist_refs(elem, elem.find("groups"))?,
    };

    Ok(vec![Record::Artist(artist)])
}

/// Parse `<name id="..">text</name>` references. Entries missing the id or
/// the name are dropped.
fn artist_refs<E: ElementView>(elem: &E, parent: Option<&E>) -> Result<Vec<ArtistRef>> {
    let Some(parent) = parent else {
        return Ok(Vec::new());
    };

    let mut refs = Vec::new();
    for name_elem in parent.find_all("name") {
        let ref_id = name_elem.attr("id").filter(|id| !id.is_empty());
        let name = name_elem.text().filter(|name| !name.is_empty());
        if let (Some(ref_id), Some(name)) = (ref_id, name) {
            let id = ref_id
                .parse::<u64>()
                .map_err(|_| parse_error(elem, "artist", format!("invalid ref id: {ref_id:?}")))?;
            refs.push(ArtistRef {
                id,
                name: name.to_string(),
            });
        }
    }
    Ok(refs)
}
