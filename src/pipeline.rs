//! Pipeline driver
//!
//! Composes reader, extractor, parser, filters and sink for each input
//! file: one element at a time, records routed through the filter chain
//! into the sink, counters updated per record and progress reported per
//! element. Aggregating sinks stay open across all inputs; file sinks are
//! opened per input.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::entity::{database_stem, EntityType};
use crate::errors::{DumpError, Result};
use crate::filter::{FilterChain, Filtered};
use crate::parsers::element_id;
use crate::reader::DumpReader;
use crate::sink::{Compression, FileFormat, Sink};
use crate::summary::SummaryCollector;
use crate::xml::{ElementExtractor, TrackingElement};

/// Options shared by `convert` and `load`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub limit: Option<u64>,
    pub strict: bool,
    pub fail_on_unhandled: bool,
    pub show_progress: bool,
    /// Entity override; bypasses the filename check.
    pub entity: Option<EntityType>,
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub format: FileFormat,
    pub compression: Compression,
    pub output_dir: PathBuf,
    pub run: RunOptions,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub batch_size: usize,
    pub commit_interval: Option<u64>,
    pub run: RunOptions,
}

/// Convert dumps to a file format.
pub async fn convert(
    paths: &[PathBuf],
    options: &ConvertOptions,
    filters: &FilterChain,
    mut summary: Option<&mut SummaryCollector>,
) -> Result<()> {
    let valid = existing_files(paths);
    let mut progress = ProgressTracker::new(options.run.show_progress, options.run.limit, &valid);

    if options.format.aggregates_inputs() {
        let mut sink = Sink::open_file(options.format, None, options.compression)?;
        let result = run_files(
            &valid,
            &options.run,
            &mut sink,
            filters,
            &mut summary,
            &mut progress,
        )
        .await;
        settle(sink, result).await?;
    } else {
        for path in &valid {
            let entity = resolve_entity(path, options.run.entity)?;
            let output =
                build_output_path(path, options.format, &options.output_dir, options.compression);
            let mut sink = Sink::open_file(options.format, Some(&output), options.compression)?;
            let result = execute(
                path,
                entity,
                &options.run,
                &mut sink,
                filters,
                &mut summary,
                &progress,
            )
            .await;
            settle(sink, result).await?;
            progress.advance_file(path);
        }
    }

    progress.finish();
    Ok(())
}

/// Load dumps into a database. The database sink aggregates all inputs
/// into one destination.
pub async fn load(
    paths: &[PathBuf],
    dsn: &str,
    options: &LoadOptions,
    filters: &FilterChain,
    mut summary: Option<&mut SummaryCollector>,
) -> Result<()> {
    let valid = existing_files(paths);
    let mut progress = ProgressTracker::new(options.run.show_progress, options.run.limit, &valid);

    let mut sink =
        Sink::open_database(dsn, options.batch_size, options.commit_interval).await?;
    let result = run_files(
        &valid,
        &options.run,
        &mut sink,
        filters,
        &mut summary,
        &mut progress,
    )
    .await;
    settle(sink, result).await?;

    progress.finish();
    Ok(())
}

fn existing_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths.iter().filter(|p| p.is_file()).cloned().collect()
}

fn resolve_entity(path: &Path, entity: Option<EntityType>) -> Result<EntityType> {
    match entity {
        Some(entity) => Ok(entity),
        None => EntityType::from_path(path),
    }
}

/// Close the sink on success, release it on error.
async fn settle(sink: Sink, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => sink.close().await,
        Err(err) => {
            sink.abort().await;
            Err(err)
        }
    }
}

async fn run_files(
    paths: &[PathBuf],
    run: &RunOptions,
    sink: &mut Sink,
    filters: &FilterChain,
    summary: &mut Option<&mut SummaryCollector>,
    progress: &mut ProgressTracker,
) -> Result<()> {
    for path in paths {
        let entity = resolve_entity(path, run.entity)?;
        execute(path, entity, run, sink, filters, summary, progress).await?;
        progress.advance_file(path);
    }
    Ok(())
}

/// Process one input file element by element.
async fn execute(
    path: &Path,
    entity: EntityType,
    run: &RunOptions,
    sink: &mut Sink,
    filters: &FilterChain,
    summary: &mut Option<&mut SummaryCollector>,
    progress: &ProgressTracker,
) -> Result<()> {
    let reader = DumpReader::open(path)?;
    let bytes = reader.progress();
    let mut extractor = ElementExtractor::new(reader, entity.tag(), run.limit);

    while let Some(elem) = extractor.next_element()? {
        // parse, auditing element access when strict
        let (parsed, unaccessed) = if run.strict {
            let tracker = TrackingElement::new(&elem);
            let parsed = entity.parse_element(&tracker);
            let unaccessed = tracker.unaccessed();
            (parsed, unaccessed)
        } else {
            (entity.parse_element(&elem), BTreeSet::new())
        };

        match parsed {
            Ok(records) => {
                for record in records {
                    if let Some(summary) = summary.as_deref_mut() {
                        summary.record_read();
                    }
                    let record = match filters.apply(record) {
                        Filtered::Dropped => {
                            if let Some(summary) = summary.as_deref_mut() {
                                summary.record_dropped();
                            }
                            continue;
                        }
                        Filtered::Modified(record) => {
                            if let Some(summary) = summary.as_deref_mut() {
                                summary.record_modified();
                            }
                            record
                        }
                        Filtered::Kept(record) => record,
                    };
                    sink.write(&record).await?;
                    if let Some(summary) = summary.as_deref_mut() {
                        summary.record_written();
                    }
                }

                if !unaccessed.is_empty() {
                    let paths = unaccessed.into_iter().collect::<Vec<_>>().join(", ");
                    if run.fail_on_unhandled {
                        return Err(DumpError::Unhandled {
                            entity: entity.tag(),
                            id: element_id(&elem),
                            paths,
                        });
                    }
                    let message = format!(
                        "Unhandled in {} id={}: {}",
                        entity.tag(),
                        element_id(&elem),
                        paths
                    );
                    warn!("{message}");
                    if let Some(summary) = summary.as_deref_mut() {
                        summary.record_unhandled(message);
                    }
                }
            }
            Err(err @ DumpError::Parse { .. }) => {
                if run.fail_on_unhandled {
                    return Err(err);
                }
                let message = err.to_string();
                warn!("{message}");
                if let Some(summary) = summary.as_deref_mut() {
                    summary.record_unhandled(message);
                }
            }
            Err(err) => return Err(err),
        }

        progress.on_bytes(bytes.get());
        progress.on_element();
    }

    Ok(())
}

/// Progress reporting: byte-based over the compressed inputs by default,
/// element-based when a per-file limit makes totals exact.
pub struct ProgressTracker {
    bar: Option<ProgressBar>,
    use_elements: bool,
    bytes_completed: u64,
}

impl ProgressTracker {
    pub fn new(show: bool, limit: Option<u64>, paths: &[PathBuf]) -> Self {
        let use_elements = limit.is_some();
        if !show {
            return ProgressTracker {
                bar: None,
                use_elements,
                bytes_completed: 0,
            };
        }

        let bar = match limit {
            Some(limit) => {
                let bar = ProgressBar::new(limit * paths.len() as u64);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "{spinner:.green} [{bar:40.cyan/blue}] {human_pos}/{human_len} ({elapsed}, eta {eta})",
                        )
                        .expect("progress template is valid")
                        .progress_chars("#>-"),
                );
                bar
            }
            None => {
                let total = paths
                    .iter()
                    .filter_map(|p| p.metadata().ok())
                    .map(|m| m.len())
                    .sum();
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, eta {eta})",
                        )
                        .expect("progress template is valid")
                        .progress_chars("#>-"),
                );
                bar
            }
        };

        ProgressTracker {
            bar: Some(bar),
            use_elements,
            bytes_completed: 0,
        }
    }

    fn on_bytes(&self, bytes_read: u64) {
        if self.use_elements {
            return;
        }
        if let Some(bar) = &self.bar {
            bar.set_position(self.bytes_completed + bytes_read);
        }
    }

    fn on_element(&self) {
        if !self.use_elements {
            return;
        }
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn advance_file(&mut self, path: &Path) {
        if let Ok(metadata) = path.metadata() {
            self.bytes_completed += metadata.len();
        }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

/// Output path for one converted input:
/// `<stem without .xml.gz>.<format>[.<compression>]` in the output dir.
pub fn build_output_path(
    input: &Path,
    format: FileFormat,
    output_dir: &Path,
    compression: Compression,
) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem = name.strip_suffix(".xml.gz").unwrap_or(name);
    output_dir.join(format!(
        "{stem}.{}{}",
        format.extension(),
        compression.extension()
    ))
}

/// Default database path: `<discogs_YYYYMMDD>.db` from the first input
/// that follows the dump naming convention.
pub fn build_database_path(paths: &[PathBuf], output_dir: &Path) -> Result<PathBuf> {
    database_stem(paths)
        .map(|stem| output_dir.join(format!("{stem}.db")))
        .ok_or_else(|| {
            DumpError::Output("no valid input file found to derive database name".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn write_dump(dir: &Path, name: &str, xml: &str) -> PathBuf {
        let path = dir.join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(xml.as_bytes()).unwrap();
        encoder.finish().unwrap();
        path
    }

    fn run_options() -> RunOptions {
        RunOptions {
            limit: None,
            strict: false,
            fail_on_unhandled: false,
            show_progress: false,
            entity: None,
        }
    }

    fn convert_options(dir: &Path, format: FileFormat) -> ConvertOptions {
        ConvertOptions {
            format,
            compression: Compression::None,
            output_dir: dir.to_path_buf(),
            run: run_options(),
        }
    }

    const TWO_ARTISTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<artists>
<artist><id>1</id><name>A</name><aliases><name id="100">B</name><name id="200">C</name></aliases></artist>
<artist><id>2</id><name>B</name></artist>
</artists>"#;

    #[tokio::test]
    async fn test_convert_to_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_dump(dir.path(), "discogs_20251201_artists.xml.gz", TWO_ARTISTS);

        let mut summary = SummaryCollector::new(false);
        convert(
            &[input],
            &convert_options(dir.path(), FileFormat::Jsonl),
            &FilterChain::default(),
            Some(&mut summary),
        )
        .await
        .unwrap();

        let output = dir.path().join("discogs_20251201_artists.jsonl");
        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(first["name"], "A");
        assert!(first["real_name"].is_null());
        assert_eq!(first["aliases"][0]["id"], 100);
        assert_eq!(first["aliases"][1]["name"], "C");

        let result = summary.finish();
        assert_eq!(result.records_read, 2);
        assert_eq!(result.records_written, 2);
        assert_eq!(result.records_dropped, 0);
        assert_eq!(
            result.records_read,
            result.records_dropped + result.records_written
        );
    }

    #[tokio::test]
    async fn test_filter_drops_records() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_dump(dir.path(), "discogs_20251201_artists.xml.gz", TWO_ARTISTS);

        let filters = FilterChain::new(vec![crate::filter::Filter::Drop(
            crate::filter::ExpressionFilter::parse("id == 1").unwrap(),
        )]);
        let mut summary = SummaryCollector::new(false);
        convert(
            &[input],
            &convert_options(dir.path(), FileFormat::Jsonl),
            &filters,
            Some(&mut summary),
        )
        .await
        .unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("discogs_20251201_artists.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        let kept: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(kept["id"], 2);

        let result = summary.finish();
        assert_eq!(result.records_read, 2);
        assert_eq!(result.records_dropped, 1);
        assert_eq!(result.records_written, 1);
    }

    #[tokio::test]
    async fn test_strict_reports_unhandled() {
        let dir = tempfile::tempdir().unwrap();
        let xml = r#"<artists><artist><id>1</id><name>A</name><unknown_field>x</unknown_field></artist></artists>"#;
        let input = write_dump(dir.path(), "discogs_20251201_artists.xml.gz", xml);

        let mut options = convert_options(dir.path(), FileFormat::Blackhole);
        options.run.strict = true;

        let mut summary = SummaryCollector::new(true);
        convert(&[input], &options, &FilterChain::default(), Some(&mut summary))
            .await
            .unwrap();

        let result = summary.finish();
        assert!(result.records_unhandled >= 1);
        assert_eq!(result.records_unhandled as usize, result.warnings.len());
        assert!(result.warnings[0].starts_with("Unhandled in artist id=1:"));
        assert!(result.warnings[0].contains("unknown_field"));
        // the record itself is still written
        assert_eq!(result.records_written, 1);
    }

    #[tokio::test]
    async fn test_strict_fail_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let xml = r#"<artists><artist><id>1</id><unknown>x</unknown></artist></artists>"#;
        let input = write_dump(dir.path(), "discogs_20251201_artists.xml.gz", xml);

        let mut options = convert_options(dir.path(), FileFormat::Blackhole);
        options.run.strict = true;
        options.run.fail_on_unhandled = true;

        let err = convert(&[input], &options, &FilterChain::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DumpError::Unhandled { .. }));
    }

    #[tokio::test]
    async fn test_parse_error_is_recorded_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let xml = r#"<artists><artist><name>No Id</name></artist><artist><id>2</id></artist></artists>"#;
        let input = write_dump(dir.path(), "discogs_20251201_artists.xml.gz", xml);

        let mut summary = SummaryCollector::new(false);
        convert(
            &[input],
            &convert_options(dir.path(), FileFormat::Blackhole),
            &FilterChain::default(),
            Some(&mut summary),
        )
        .await
        .unwrap();

        let result = summary.finish();
        assert_eq!(result.records_unhandled, 1);
        assert!(result.warnings[0].starts_with("Parse error in artist id=?"));
        assert_eq!(result.records_written, 1);
    }

    #[tokio::test]
    async fn test_parse_error_fatal_with_fail_on_unhandled() {
        let dir = tempfile::tempdir().unwrap();
        let xml = r#"<artists><artist><name>No Id</name></artist></artists>"#;
        let input = write_dump(dir.path(), "discogs_20251201_artists.xml.gz", xml);

        let mut options = convert_options(dir.path(), FileFormat::Blackhole);
        options.run.fail_on_unhandled = true;

        let err = convert(&[input], &options, &FilterChain::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DumpError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_limit_caps_elements() {
        let dir = tempfile::tempdir().unwrap();
        let xml = r#"<artists><artist><id>1</id></artist><artist><id>2</id></artist><artist><id>3</id></artist></artists>"#;
        let input = write_dump(dir.path(), "discogs_20251201_artists.xml.gz", xml);

        let mut options = convert_options(dir.path(), FileFormat::Blackhole);
        options.run.limit = Some(2);

        let mut summary = SummaryCollector::new(false);
        convert(&[input], &options, &FilterChain::default(), Some(&mut summary))
            .await
            .unwrap();
        assert_eq!(summary.finish().records_written, 2);
    }

    #[tokio::test]
    async fn test_entity_override() {
        let dir = tempfile::tempdir().unwrap();
        // filename does not follow the dump convention
        let input = write_dump(
            dir.path(),
            "export.xml.gz",
            r#"<artists><artist><id>1</id></artist></artists>"#,
        );

        let mut options = convert_options(dir.path(), FileFormat::Blackhole);
        let err = convert(&[input.clone()], &options, &FilterChain::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DumpError::UnknownFilename(_)));

        options.run.entity = Some(EntityType::Artists);
        convert(&[input], &options, &FilterChain::default(), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_load_into_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_dump(dir.path(), "discogs_20251201_artists.xml.gz", TWO_ARTISTS);
        let db_path = dir.path().join("discogs_20251201.db");

        let options = LoadOptions {
            batch_size: 10,
            commit_interval: None,
            run: run_options(),
        };
        let mut summary = SummaryCollector::new(false);
        load(
            &[input],
            &db_path.display().to_string(),
            &options,
            &FilterChain::default(),
            Some(&mut summary),
        )
        .await
        .unwrap();

        assert_eq!(summary.finish().records_written, 2);
        assert!(db_path.exists());

        use sqlx::{Connection, Row, SqliteConnection};
        let mut conn = SqliteConnection::connect(&format!("sqlite://{}", db_path.display()))
            .await
            .unwrap();
        let row = sqlx::query("SELECT count(*) FROM artist")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        let count: i64 = row.get(0);
        assert_eq!(count, 2);
        let row = sqlx::query("SELECT count(*) FROM artist_alias")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        let aliases: i64 = row.get(0);
        assert_eq!(aliases, 2);
        conn.close().await.unwrap();
    }

    #[test]
    fn test_build_output_path() {
        let input = Path::new("dumps/discogs_20251201_artists.xml.gz");
        assert_eq!(
            build_output_path(input, FileFormat::Jsonl, Path::new("out"), Compression::None),
            Path::new("out/discogs_20251201_artists.jsonl")
        );
        assert_eq!(
            build_output_path(input, FileFormat::Json, Path::new("."), Compression::Gzip),
            Path::new("./discogs_20251201_artists.json.gz")
        );
        assert_eq!(
            build_output_path(input, FileFormat::Jsonl, Path::new("."), Compression::Bz2),
            Path::new("./discogs_20251201_artists.jsonl.bz2")
        );
    }

    #[test]
    fn test_build_database_path() {
        let paths = vec![PathBuf::from("discogs_20251201_artists.xml.gz")];
        assert_eq!(
            build_database_path(&paths, Path::new(".")).unwrap(),
            Path::new("./discogs_20251201.db")
        );
        assert!(build_database_path(&[PathBuf::from("x.gz")], Path::new(".")).is_err());
    }
}
