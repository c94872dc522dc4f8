//! Artist records

use serde::{Deserialize, Serialize};

/// One artist from the artists dump.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: u64,
    pub name: Option<String>,
    pub real_name: Option<String>,
    pub profile: Option<String>,
    pub data_quality: Option<String>,
    pub urls: Vec<String>,
    pub name_variations: Vec<String>,
    pub aliases: Vec<ArtistRef>,
    pub members: Vec<ArtistRef>,
    pub groups: Vec<ArtistRef>,
}

/// Reference to another artist (aliases, members, groups).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: u64,
    pub name: String,
}

impl Artist {
    pub(super) fn unset_field(&mut self, field: &str) -> bool {
        match field {
            "name" => self.name = None,
            "real_name" => self.real_name = None,
            "profile" => self.profile = None,
            "data_quality" => self.data_quality = None,
            "urls" => self.urls.clear(),
            "name_variations" => self.name_variations.clear(),
            "aliases" => self.aliases.clear(),
            "members" => self.members.clear(),
            "groups" => self.groups.clear(),
            _ => return false,
        }
        true
    }
}
