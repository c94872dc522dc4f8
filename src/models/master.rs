//! Master-release records and the credit/video types shared with releases

use serde::{Deserialize, Serialize};

/// One master release from the masters dump.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterRelease {
    pub id: u64,
    pub data_quality: Option<String>,
    pub main_release: Option<u64>,
    pub notes: Option<String>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub artists: Vec<CreditArtist>,
    pub genres: Vec<String>,
    pub styles: Vec<String>,
    pub videos: Vec<Video>,
}

/// Credited artist on a master, release or track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreditArtist {
    pub id: u64,
    pub artist_name_variation: Option<String>,
    pub join: Option<String>,
    pub name: String,
}

/// Embedded video link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub description: Option<String>,
    pub duration: Option<i32>,
    pub embed: Option<bool>,
    pub src: Option<String>,
    pub title: Option<String>,
}

impl MasterRelease {
    pub(super) fn unset_field(&mut self, field: &str) -> bool {
        match field {
            "data_quality" => self.data_quality = None,
            "main_release" => self.main_release = None,
            "notes" => self.notes = None,
            "title" => self.title = None,
            "year" => self.year = None,
            "artists" => self.artists.clear(),
            "genres" => self.genres.clear(),
            "styles" => self.styles.clear(),
            "videos" => self.videos.clear(),
            _ => return false,
        }
        true
    }
}
