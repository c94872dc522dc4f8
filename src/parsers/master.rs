//! Master-release parser, plus the credit and video parsing shared with
//! releases.

use crate::errors::Result;
use crate::models::{CreditArtist, MasterRelease, Record, Video};
use crate::xml::ElementView;

use super::{optional_number, owned, parse_error, required_id, text_list};

pub(super) fn parse<E: ElementView>(elem: &E) -> Result<Vec<Record>> {
    let id = required_id(elem, "master", elem.attr("id"))?;

    let master = MasterRelease {
        id,
        data_quality: owned(elem.find_text("data_quality")),
        main_release: optional_number(elem, "master", "main_release", elem.find_text("main_release"))?,
        notes: owned(elem.find_text("notes")),
        title: owned(elem.find_text("title")),
        year: optional_number(elem, "master", "year", elem.find_text("year"))?,
        artists: credit_artists(elem, "master", elem.find("artists"))?,
        genres: text_list(elem.find("genres"), "genre"),
        styles: text_list(elem.find("styles"), "style"),
        videos: videos(elem, "master", elem.find("videos"))?,
    };

    Ok(vec![Record::MasterRelease(master)])
}

/// Parse `<artist>` credits from a container. Each credit element is walked
/// once, dispatching on child tag; this is the hot path for big releases.
/// Credits missing the id or the name are dropped.
pub(super) fn credit_artists<E: ElementView>(
    elem: &E,
    entity: &'static str,
    parent: Option<&E>,
) -> Result<Vec<CreditArtist>> {
    let Some(parent) = parent else {
        return Ok(Vec::new());
    };

    let mut credits = Vec::new();
    for artist_elem in parent.find_all("artist") {
        let mut id_text: Option<String> = None;
        let mut name: Option<String> = None;
        let mut anv: Option<String> = None;
        let mut join: Option<String> = None;

        for child in artist_elem.children() {
            let text = || child.text().unwrap_or("").to_string();
            match child.tag() {
                "id" => id_text = Some(text()),
                "name" => name = Some(text()),
                "anv" => anv = Some(text()),
                "join" => join = Some(text()),
                _ => {}
            }
        }

        let id_text = id_text.filter(|id| !id.is_empty());
        let name = name.filter(|name| !name.is_empty());
        if let (Some(id_text), Some(name)) = (id_text, name) {
            let id = id_text.parse::<u64>().map_err(|_| {
                parse_error(elem, entity, format!("invalid artist credit id: {id_text:?}"))
            })?;
            credits.push(CreditArtist {
                id,
                artist_name_variation: anv,
                join,
                name,
            });
        }
    }
    Ok(credits)
}

/// Parse `<video>` entries. Videos are always emitted; every field is
/// optional.
pub(super) fn videos<E: ElementView>(
    elem: &E,
    entity: &'static str,
    parent: Option<&E>,
) -> Result<Vec<Video>> {
    let Some(parent) = parent else {
        return Ok(Vec::new());
    };

    let mut videos = Vec::new();
    for video_elem in parent.find_all("video") {
        videos.push(Video {
            description: owned(video_elem.find_text("description")),
            duration: optional_number(elem, entity, "video duration", video_elem.attr("duration"))?,
            embed: video_elem.attr("embed").map(|value| value == "true"),
            src: owned(video_elem.attr("src")),
            title: owned(video_elem.find_text("title")),
        });
    }
    Ok(videos)
}
