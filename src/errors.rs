//! Error types for the ingestion engine
//!
//! The parser and filter layers never panic; every failure becomes a
//! [`DumpError`]. The pipeline decides per variant whether to record a
//! warning and continue or to abort the run.

use thiserror::Error;

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, DumpError>;

/// Errors surfaced by the ingestion engine.
#[derive(Debug, Error)]
pub enum DumpError {
    /// A required field was missing or a present value failed to parse.
    /// Recoverable: the pipeline records a warning and skips the element
    /// unless fail-on-unhandled is set.
    #[error("Parse error in {entity} id={id}: {message}")]
    Parse {
        entity: &'static str,
        id: String,
        message: String,
    },

    /// Strict mode found element data no parser consulted.
    #[error("Unhandled in {entity} id={id}: {paths}")]
    Unhandled {
        entity: &'static str,
        id: String,
        paths: String,
    },

    /// Input filename does not follow the dump naming convention and no
    /// entity override was given.
    #[error("unrecognized filename pattern: {0}")]
    UnknownFilename(String),

    #[error("invalid DSN: {0}")]
    InvalidDsn(String),

    #[error("invalid filter expression: {0}")]
    FilterSyntax(String),

    #[error("{0}")]
    Output(String),

    /// Malformed XML structure. Fatal for the current file.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
