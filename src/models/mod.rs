//! Typed records produced by the entity parsers

mod artist;
mod label;
mod master;
mod release;

pub use artist::{Artist, ArtistRef};
pub use label::{Label, LabelRef};
pub use master::{CreditArtist, MasterRelease, Video};
pub use release::{
    Company, ExtraArtist, Format, Identifier, Release, ReleaseLabel, Series, SubTrack, Track,
};

use serde::{Deserialize, Serialize};

/// Any record the pipeline can route. Serializes as the inner record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Artist(Artist),
    Label(Label),
    MasterRelease(MasterRelease),
    Release(Release),
}

impl Record {
    /// Record type name, e.g. `MasterRelease`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Record::Artist(_) => "Artist",
            Record::Label(_) => "Label",
            Record::MasterRelease(_) => "MasterRelease",
            Record::Release(_) => "Release",
        }
    }

    /// Identifier of the underlying entity.
    pub fn id(&self) -> u64 {
        match self {
            Record::Artist(a) => a.id,
            Record::Label(l) => l.id,
            Record::MasterRelease(m) => m.id,
            Record::Release(r) => r.id,
        }
    }

    /// Set a field to its empty state: `None` for optional scalars, empty
    /// for collections. Returns whether the record has such a field. The
    /// required `id` is not unsettable.
    pub fn unset_field(&mut self, field: &str) -> bool {
        match self {
            Record::Artist(a) => a.unset_field(field),
            Record::Label(l) => l.unset_field(field),
            Record::MasterRelease(m) => m.unset_field(field),
            Record::Release(r) => r.unset_field(field),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_as_inner() {
        let record = Record::Artist(Artist {
            id: 1,
            name: Some("A".into()),
            ..Default::default()
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["name"], "A");
        // optional fields serialize as explicit nulls
        assert!(value["real_name"].is_null());
        assert_eq!(value["aliases"], serde_json::json!([]));
    }

    #[test]
    fn test_unset_field() {
        let mut record = Record::Artist(Artist {
            id: 1,
            name: Some("A".into()),
            urls: vec!["http://example.com".into()],
            ..Default::default()
        });

        assert!(record.unset_field("name"));
        assert!(record.unset_field("urls"));
        assert!(!record.unset_field("nonexistent"));
        assert!(!record.unset_field("id"));

        match record {
            Record::Artist(a) => {
                assert_eq!(a.name, None);
                assert!(a.urls.is_empty());
                assert_eq!(a.id, 1);
            }
            _ => unreachable!(),
        }
    }
}
