//! Dump sampler
//!
//! Copies the first N entity elements of a dump into a new, valid gzipped
//! XML file. Useful for carving test fixtures and benchmark inputs out of
//! multi-gigabyte dumps.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;

use crate::entity::EntityType;
use crate::errors::Result;
use crate::reader::DumpReader;
use crate::xml::ElementExtractor;

/// Default sample filename: `<stem>_sample_<N>.xml.gz`.
pub fn build_sample_path(input: &Path, count: u64) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem = name.strip_suffix(".xml.gz").unwrap_or(name);
    PathBuf::from(format!("{stem}_sample_{count}.xml.gz"))
}

/// Extract the first `count` elements of `input` into `output`, wrapped in
/// the entity's plural root element. Returns the number written, which is
/// less than `count` when the input runs out first.
pub fn sample(
    input: &Path,
    output: &Path,
    count: u64,
    mut on_progress: Option<&mut dyn FnMut()>,
) -> Result<u64> {
    let entity = EntityType::from_path(input)?;

    let reader = DumpReader::open(input)?;
    let mut extractor = ElementExtractor::new(reader, entity.tag(), Some(count));

    let out = std::fs::File::create(output)?;
    let mut encoder = GzEncoder::new(out, flate2::Compression::new(6));

    encoder.write_all(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")?;
    writeln!(encoder, "<{}>", entity.plural())?;

    let mut written = 0;
    while let Some(elem) = extractor.next_element()? {
        elem.write_xml(&mut encoder)?;
        encoder.write_all(b"\n")?;
        written += 1;
        if let Some(on_progress) = on_progress.as_deref_mut() {
            on_progress();
        }
    }

    writeln!(encoder, "</{}>", entity.plural())?;
    encoder.finish()?.flush()?;

    Ok(written)
}
