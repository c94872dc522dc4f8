//! Output sinks
//!
//! Two disjoint families share one contract (open, write, close with a
//! release guarantee): serialization sinks writing record files, and
//! relational sinks bulk-loading a database. The set of variants is finite
//! and stable, so a tagged enum with direct dispatch is used rather than a
//! trait object.

pub mod describe;
pub mod dsn;
pub mod file;
pub mod postgres;
pub mod schema;
pub mod sqlite;

pub use dsn::{infer_database, sqlite_path, DatabaseType};
pub use postgres::PostgresSink;
pub use sqlite::SqliteSink;

use std::path::Path;

use crate::errors::{DumpError, Result};
use crate::models::Record;

/// File output formats of the `convert` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FileFormat {
    /// Drop records; mostly useful for benchmarking.
    Blackhole,
    Console,
    Json,
    Jsonl,
}

impl FileFormat {
    /// Whether one destination accepts records from all input files, as
    /// opposed to one output per input.
    pub fn aggregates_inputs(self) -> bool {
        matches!(self, FileFormat::Blackhole | FileFormat::Console)
    }

    /// Output filename extension.
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Blackhole => "blackhole",
            FileFormat::Console => "console",
            FileFormat::Json => "json",
            FileFormat::Jsonl => "jsonl",
        }
    }
}

/// Optional compression layered over file outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Compression {
    None,
    Gzip,
    Bz2,
}

impl Compression {
    /// Extra filename extension, empty for no compression.
    pub fn extension(self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
            Compression::Bz2 => ".bz2",
        }
    }
}

/// One open output destination.
pub enum Sink {
    Blackhole,
    Console,
    Json(file::JsonSink),
    Jsonl(file::JsonlSink),
    Sqlite(SqliteSink),
    Postgres(PostgresSink),
}

impl Sink {
    /// Open a file-format sink. Blackhole and console ignore the path.
    pub fn open_file(
        format: FileFormat,
        path: Option<&Path>,
        compression: Compression,
    ) -> Result<Sink> {
        let require_path = || {
            path.ok_or_else(|| {
                DumpError::Output(format!("{} output requires a path", format.extension()))
            })
        };
        Ok(match format {
            FileFormat::Blackhole => Sink::Blackhole,
            FileFormat::Console => Sink::Console,
            FileFormat::Json => Sink::Json(file::JsonSink::create(require_path()?, compression)?),
            FileFormat::Jsonl => {
                Sink::Jsonl(file::JsonlSink::create(require_path()?, compression)?)
            }
        })
    }

    /// Open a database sink, inferring the backend from the DSN.
    pub async fn open_database(
        dsn: &str,
        batch_size: usize,
        commit_interval: Option<u64>,
    ) -> Result<Sink> {
        Ok(match infer_database(dsn)? {
            DatabaseType::Sqlite => Sink::Sqlite(SqliteSink::connect(dsn, batch_size).await?),
            DatabaseType::Postgresql => {
                Sink::Postgres(PostgresSink::connect(dsn, batch_size, commit_interval).await?)
            }
        })
    }

    pub async fn write(&mut self, record: &Record) -> Result<()> {
        match self {
            Sink::Blackhole => Ok(()),
            Sink::Console => {
                file::write_console(record);
                Ok(())
            }
            Sink::Json(sink) => sink.write(record),
            Sink::Jsonl(sink) => sink.write(record),
            Sink::Sqlite(sink) => sink.write(record).await,
            Sink::Postgres(sink) => sink.write(record).await,
        }
    }

    /// Clean close: flush everything and finalize the destination.
    pub async fn close(self) -> Result<()> {
        match self {
            Sink::Blackhole | Sink::Console => Ok(()),
            Sink::Json(sink) => sink.close(),
            Sink::Jsonl(sink) => sink.close(),
            Sink::Sqlite(sink) => sink.close().await,
            Sink::Postgres(sink) => sink.close().await,
        }
    }

    /// Best-effort release on error paths. Never fails; partial file
    /// output is left as-is, database work is rolled back.
    pub async fn abort(self) {
        match self {
            Sink::Blackhole | Sink::Console | Sink::Json(_) | Sink::Jsonl(_) => {}
            Sink::Sqlite(sink) => sink.abort().await,
            Sink::Postgres(sink) => sink.abort().await,
        }
    }
}
