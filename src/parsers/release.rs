//! Release parser
//!
//! The release element is the deepest structure in the dumps: eleven
//! collections, with tracklist entries nesting one further level of
//! sub-tracks. Collection entries are walked in a single pass each.

use crate::errors::Result;
use crate::models::{
    Company, ExtraArtist, Format, Identifier, Record, Release, ReleaseLabel, Series, SubTrack,
    Track,
};
use crate::xml::ElementView;

use super::master::{credit_artists, videos};
use super::{optional_number, owned, parse_error, required_id, text_list};

const ENTITY: &str = "release";

pub(super) fn parse<E: ElementView>(elem: &E) -> Result<Vec<Record>> {
    let id = required_id(elem, ENTITY, elem.attr("id"))?;

    let mut master_id = None;
    let mut is_main_release = None;
    if let Some(master_elem) = elem.find("master_id") {
        let text = master_elem.text().unwrap_or("");
        if !text.is_empty() {
            master_id = Some(text.parse::<u64>().map_err(|_| {
                parse_error(elem, ENTITY, format!("invalid master_id: {text:?}"))
            })?);
            is_main_release = master_elem
                .attr("is_main_release")
                .map(|value| value == "true");
        }
    }

    let release = Release {
        id,
        country: owned(elem.find_text("country")),
        data_quality: owned(elem.find_text("data_quality")),
        is_main_release,
        master_id,
        notes: owned(elem.find_text("notes")),
        released: owned(elem.find_text("released")),
        status: owned(elem.attr("status")),
        title: owned(elem.find_text("title")),
        artists: credit_artists(elem, ENTITY, elem.find("artists"))?,
        companies: companies(elem, elem.find("companies"))?,
        extra_artists: extra_artists(elem, elem.find("extraartists"))?,
        formats: formats(elem.find("formats")),
        genres: text_list(elem.find("genres"), "genre"),
        identifiers: identifiers(elem.find("identifiers")),
        labels: release_labels(elem, elem.find("labels"))?,
        series: series(elem, elem.find("series"))?,
        styles: text_list(elem.find("styles"), "style"),
        tracklist: tracks(elem, elem.find("tracklist"))?,
        videos: videos(elem, ENTITY, elem.find("videos"))?,
    };

    Ok(vec![Record::Release(release)])
}

/// Parse `<company>` credits. Entries missing the id or the name are
/// dropped.
fn companies<E: ElementView>(elem: &E, parent: Option<&E>) -> Result<Vec<Company>> {
    let Some(parent) = parent else {
        return Ok(Vec::new());
    };

    let mut companies = Vec::new();
    for company_elem in parent.find_all("company") {
        let mut id_text: Option<String> = None;
        let mut name: Option<String> = None;
        let mut catalog_number: Option<String> = None;
        let mut entity_type_text: Option<String> = None;
        let mut entity_type_name: Option<String> = None;

        for child in company_elem.children() {
            let text = || child.text().unwrap_or("").to_string();
            match child.tag() {
                "id" => id_text = Some(text()),
                "name" => name = Some(text()),
                "catno" => catalog_number = Some(text()),
                "entity_type" => entity_type_text = Some(text()),
                "entity_type_name" => entity_type_name = Some(text()),
                // present in the dumps but carries no information
                "resource_url" => {
                    let _ = child.text();
                }
                _ => {}
            }
        }

        let entity_type =
            optional_number(elem, ENTITY, "entity_type", entity_type_text.as_deref())?;

        let id_text = id_text.filter(|id| !id.is_empty());
        let name = name.filter(|name| !name.is_empty());
        if let (Some(id_text), Some(name)) = (id_text, name) {
            let id = id_text.parse::<u64>().map_err(|_| {
                parse_error(elem, ENTITY, format!("invalid company id: {id_text:?}"))
            })?;
            companies.push(Company {
                id,
                catalog_number,
                entity_type,
                entity_type_name,
                name,
            });
        }
    }
    Ok(companies)
}

/// Parse `<artist>` entries under `<extraartists>`. Only the name is
/// required; the id is optional for anonymous credits.
fn extra_artists<E: ElementView>(elem: &E, parent: Option<&E>) -> Result<Vec<ExtraArtist>> {
    let Some(parent) = parent else {
        return Ok(Vec::new());
    };

    let mut artists = Vec::new();
    for artist_elem in parent.find_all("artist") {
        let mut id_text: Option<String> = None;
        let mut name: Option<String> = None;
        let mut anv: Option<String> = None;
        let mut role: Option<String> = None;
        let mut tracks: Option<String> = None;

        for child in artist_elem.children() {
            let text = || child.text().unwrap_or("").to_string();
            match child.tag() {
                "id" => id_text = Some(text()),
                "name" => name = Some(text()),
                "anv" => anv = Some(text()),
                "role" => role = Some(text()),
                "tracks" => tracks = Some(text()),
                _ => {}
            }
        }

        let id = match id_text.filter(|id| !id.is_empty()) {
            Some(id_text) => Some(id_text.parse::<u64>().map_err(|_| {
                parse_error(elem, ENTITY, format!("invalid extra artist id: {id_text:?}"))
            })?),
            None => None,
        };

        if let Some(name) = name.filter(|name| !name.is_empty()) {
            artists.push(ExtraArtist {
                id,
                artist_name_variation: anv,
                name,
                role,
                tracks,
            });
        }
    }
    Ok(artists)
}

/// Parse `<format>` entries. Always emitted; the quantity stays a string
/// because values beyond the 64-bit range occur in the wild.
fn formats<E: ElementView>(parent: Option<&E>) -> Vec<Format> {
    let Some(parent) = parent else {
        return Vec::new();
    };

    parent
        .find_all("format")
        .into_iter()
        .map(|format_elem| Format {
            name: owned(format_elem.attr("name")),
            quantity: owned(format_elem.attr("qty")),
            text: owned(format_elem.attr("text")),
            descriptions: text_list(format_elem.find("descriptions"), "description"),
        })
        .collect()
}

/// Parse `<identifier>` entries. Type and value are required.
fn identifiers<E: ElementView>(parent: Option<&E>) -> Vec<Identifier> {
    let Some(parent) = parent else {
        return Vec::new();
    };

    let mut identifiers = Vec::new();
    for id_elem in parent.find_all("identifier") {
        let kind = id_elem.attr("type").filter(|kind| !kind.is_empty());
        let description = id_elem.attr("description");
        let value = id_elem.attr("value").filter(|value| !value.is_empty());
        if let (Some(kind), Some(value)) = (kind, value) {
            identifiers.push(Identifier {
                kind: kind.to_string(),
                description: owned(description),
                value: value.to_string(),
            });
        }
    }
    identifiers
}

/// Parse `<label>` credits. Id and name are required attributes.
fn release_labels<E: ElementView>(elem: &E, parent: Option<&E>) -> Result<Vec<ReleaseLabel>> {
    let Some(parent) = parent else {
        return Ok(Vec::new());
    };

    let mut labels = Vec::new();
    for label_elem in parent.find_all("label") {
        let label_id = label_elem.attr("id").filter(|id| !id.is_empty());
        let name = label_elem.attr("name").filter(|name| !name.is_empty());
        let catalog_number = label_elem.attr("catno");
        if let (Some(label_id), Some(name)) = (label_id, name) {
            let id = label_id.parse::<u64>().map_err(|_| {
                parse_error(elem, ENTITY, format!("invalid label id: {label_id:?}"))
            })?;
            labels.push(ReleaseLabel {
                id,
                catalog_number: owned(catalog_number),
                name: name.to_string(),
            });
        }
    }
    Ok(labels)
}

/// Parse `<series>` entries (the container and entry tags coincide).
fn series<E: ElementView>(elem: &E, parent: Option<&E>) -> Result<Vec<Series>> {
    let Some(parent) = parent else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    for series_elem in parent.find_all("series") {
        let series_id = series_elem.attr("id").filter(|id| !id.is_empty());
        let name = series_elem.attr("name").filter(|name| !name.is_empty());
        let catalog_number = series_elem.attr("catno");
        if let (Some(series_id), Some(name)) = (series_id, name) {
            let id = series_id.parse::<u64>().map_err(|_| {
                parse_error(elem, ENTITY, format!("invalid series id: {series_id:?}"))
            })?;
            entries.push(Series {
                id,
                catalog_number: owned(catalog_number),
                name: name.to_string(),
            });
        }
    }
    Ok(entries)
}

struct TrackParts {
    position: Option<String>,
    title: Option<String>,
    duration: Option<String>,
}

/// Walk one `<track>` element, collecting scalar children and handing the
/// credit containers back to the caller.
fn track_parts<'e, E: ElementView>(
    track_elem: &'e E,
) -> (TrackParts, Option<&'e E>, Option<&'e E>, Option<&'e E>) {
    let mut parts = TrackParts {
        position: None,
        title: None,
        duration: None,
    };
    let mut artists = None;
    let mut extra = None;
    let mut sub = None;

    for child in track_elem.children() {
        let text = || child.text().unwrap_or("").to_string();
        match child.tag() {
            "position" => parts.position = Some(text()),
            "title" => parts.title = Some(text()),
            "duration" => parts.duration = Some(text()),
            "artists" => artists = Some(child),
            "extraartists" => extra = Some(child),
            "sub_tracks" => sub = Some(child),
            _ => {}
        }
    }

    (parts, artists, extra, sub)
}

fn tracks<E: ElementView>(elem: &E, parent: Option<&E>) -> Result<Vec<Track>> {
    let Some(parent) = parent else {
        return Ok(Vec::new());
    };

    let mut tracks = Vec::new();
    for track_elem in parent.find_all("track") {
        let (parts, artists, extra, sub) = track_parts(track_elem);
        tracks.push(Track {
            position: parts.position,
            title: parts.title,
            duration: parts.duration,
            artists: credit_artists(elem, ENTITY, artists)?,
            extra_artists: extra_artists(elem, extra)?,
            sub_tracks: sub_tracks(elem, sub)?,
        });
    }
    Ok(tracks)
}

fn sub_tracks<E: ElementView>(elem: &E, parent: Option<&E>) -> Result<Vec<SubTrack>> {
    let Some(parent) = parent else {
        return Ok(Vec::new());
    };

    let mut tracks = Vec::new();
    for track_elem in parent.find_all("track") {
        let (parts, artists, extra, _) = track_parts(track_elem);
        tracks.push(SubTrack {
            position: parts.position,
            title: parts.title,
            duration: parts.duration,
            artists: credit_artists(elem, ENTITY, artists)?,
            extra_artists: extra_artists(elem, extra)?,
        });
    }
    Ok(tracks)
}
