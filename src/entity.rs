//! Entity kinds and filename-based dispatch
//!
//! Dump files follow the naming convention
//! `discogs_<YYYYMMDD>_<entity>(_sample_<N>)?.xml.gz`. The entity segment
//! selects the parser; `--type` overrides the filename check entirely.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{DumpError, Result};

/// The four Discogs dump entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum EntityType {
    Artists,
    Labels,
    Masters,
    Releases,
}

static FILENAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^discogs_\d{8}_(artists|labels|masters|releases)(?:_sample_\d+)?\.xml\.gz$")
        .expect("filename pattern is valid")
});

static DATABASE_STEM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(discogs_\d{8})_\w+\.xml\.gz$").expect("stem pattern is valid")
});

impl EntityType {
    /// XML tag of a single entity element, e.g. `artist` in the artists dump.
    pub fn tag(self) -> &'static str {
        match self {
            EntityType::Artists => "artist",
            EntityType::Labels => "label",
            EntityType::Masters => "master",
            EntityType::Releases => "release",
        }
    }

    /// Plural name, which is also the root element of the dump.
    pub fn plural(self) -> &'static str {
        match self {
            EntityType::Artists => "artists",
            EntityType::Labels => "labels",
            EntityType::Masters => "masters",
            EntityType::Releases => "releases",
        }
    }

    /// Determine the entity from a dump filename.
    pub fn from_path(path: &Path) -> Result<EntityType> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DumpError::UnknownFilename(path.display().to_string()))?;
        let captures = FILENAME_PATTERN
            .captures(name)
            .ok_or_else(|| DumpError::UnknownFilename(name.to_string()))?;
        Ok(match &captures[1] {
            "artists" => EntityType::Artists,
            "labels" => EntityType::Labels,
            "masters" => EntityType::Masters,
            _ => EntityType::Releases,
        })
    }
}

/// Derive the default database stem (e.g. `discogs_20251201`) from the
/// first input filename that follows the dump naming convention.
pub fn database_stem(paths: &[std::path::PathBuf]) -> Option<String> {
    paths.iter().find_map(|path| {
        let name = path.file_name()?.to_str()?;
        DATABASE_STEM_PATTERN
            .captures(name)
            .map(|c| c[1].to_string())
    })
}
