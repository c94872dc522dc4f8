//! Release records and their nested collection types

use serde::{Deserialize, Serialize};

use super::{CreditArtist, Video};

/// One release from the releases dump. The largest record type: eleven
/// collections, with the tracklist nesting one further level of sub-tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: u64,
    pub country: Option<String>,
    pub data_quality: Option<String>,
    /// Tri-state: the `is_main_release` attribute of `<master_id>` when
    /// present, absent otherwise.
    pub is_main_release: Option<bool>,
    pub master_id: Option<u64>,
    pub notes: Option<String>,
    pub released: Option<String>,
    pub status: Option<String>,
    pub title: Option<String>,
    pub artists: Vec<CreditArtist>,
    pub companies: Vec<Company>,
    pub extra_artists: Vec<ExtraArtist>,
    pub formats: Vec<Format>,
    pub genres: Vec<String>,
    pub identifiers: Vec<Identifier>,
    pub labels: Vec<ReleaseLabel>,
    pub series: Vec<Series>,
    pub styles: Vec<String>,
    pub tracklist: Vec<Track>,
    pub videos: Vec<Video>,
}

/// Non-performing credit (producer, engineer, artwork, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraArtist {
    pub id: Option<u64>,
    pub artist_name_variation: Option<String>,
    pub name: String,
    pub role: Option<String>,
    pub tracks: Option<String>,
}

/// Label credit on a release.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseLabel {
    pub id: u64,
    pub catalog_number: Option<String>,
    pub name: String,
}

/// Physical or digital format of a release.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Format {
    pub name: Option<String>,
    /// Kept as a string: quantities beyond the 64-bit range occur in the
    /// wild and must round-trip.
    pub quantity: Option<String>,
    pub text: Option<String>,
    pub descriptions: Vec<String>,
}

/// Release identifier (barcode, matrix number, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: Option<String>,
    pub value: String,
}

/// Company credit (pressing plant, distributor, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: u64,
    pub catalog_number: Option<String>,
    pub entity_type: Option<i32>,
    pub entity_type_name: Option<String>,
    pub name: String,
}

/// Series membership of a release.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: u64,
    pub catalog_number: Option<String>,
    pub name: String,
}

/// One tracklist entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub position: Option<String>,
    pub title: Option<String>,
    pub duration: Option<String>,
    pub artists: Vec<CreditArtist>,
    pub extra_artists: Vec<ExtraArtist>,
    pub sub_tracks: Vec<SubTrack>,
}

/// Index-track entry nested inside a [`Track`]. Nesting stops here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubTrack {
    pub position: Option<String>,
    pub title: Option<String>,
    pub duration: Option<String>,
    pub artists: Vec<CreditArtist>,
    pub extra_artists: Vec<ExtraArtist>,
}

impl Release {
    pub(super) fn unset_field(&mut self, field: &str) -> bool {
        match field {
            "country" => self.country = None,
            "data_quality" => self.data_quality = None,
            "is_main_release" => self.is_main_release = None,
            "master_id" => self.master_id = None,
            "notes" => self.notes = None,
            "released" => self.released = None,
            "status" => self.status = None,
            "title" => self.title = None,
            "artists" => self.artists.clear(),
            "companies" => self.companies.clear(),
            "extra_artists" => self.extra_artists.clear(),
            "formats" => self.formats.clear(),
            "genres" => self.genres.clear(),
            "identifiers" => self.identifiers.clear(),
            "labels" => self.labels.clear(),
            "series" => self.series.clear(),
            "styles" => self.styles.clear(),
            "tracklist" => self.tracklist.clear(),
            "videos" => self.videos.clear(),
            _ => return false,
        }
        true
    }
}
