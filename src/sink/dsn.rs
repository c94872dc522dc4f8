//! DSN parsing and database-type inference

use crate::errors::{DumpError, Result};

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    Sqlite,
    Postgresql,
}

/// Pick the backend from the DSN prefix. Bare paths are SQLite files;
/// unknown schemes are rejected.
pub fn infer_database(dsn: &str) -> Result<DatabaseType> {
    if dsn.starts_with("postgresql://") || dsn.starts_with("postgres://") {
        return Ok(DatabaseType::Postgresql);
    }
    if dsn.starts_with("sqlite:") {
        return Ok(DatabaseType::Sqlite);
    }
    match dsn.split_once("://") {
        Some((scheme, _)) => Err(DumpError::InvalidDsn(format!(
            "unsupported scheme: {scheme}"
        ))),
        None => Ok(DatabaseType::Sqlite),
    }
}

/// Resolve a SQLite DSN to a filesystem path (or `:memory:`).
///
/// - `sqlite:///relative.db` → `relative.db`
/// - `sqlite:////absolute/path.db` → `/absolute/path.db`
/// - `sqlite:///:memory:` → `:memory:`
/// - plain paths pass through unchanged
pub fn sqlite_path(dsn: &str) -> Result<String> {
    let Some((scheme, rest)) = dsn.split_once("://") else {
        return Ok(dsn.to_string());
    };
    if scheme != "sqlite" {
        return Err(DumpError::InvalidDsn(format!(
            "unsupported scheme: {scheme}"
        )));
    }

    if rest == "/:memory:" {
        return Ok(":memory:".to_string());
    }
    // the URL form keeps one leading slash too many
    match rest.strip_prefix('/') {
        Some(path) => Ok(path.to_string()),
        None => Ok(rest.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_database() {
        assert_eq!(
            infer_database("postgresql://localhost/db").unwrap(),
            DatabaseType::Postgresql
        );
        assert_eq!(
            infer_database("postgres://localhost/db").unwrap(),
            DatabaseType::Postgresql
        );
        assert_eq!(
            infer_database("sqlite:///x.db").unwrap(),
            DatabaseType::Sqlite
        );
        assert_eq!(infer_database("dump.db").unwrap(), DatabaseType::Sqlite);
        assert!(infer_database("mysql://localhost/db").is_err());
    }

    #[test]
    fn test_sqlite_path_relative() {
        assert_eq!(sqlite_path("sqlite:///dump.db").unwrap(), "dump.db");
        assert_eq!(sqlite_path("sqlite:///./dump.db").unwrap(), "./dump.db");
    }

    #[test]
    fn test_sqlite_path_absolute() {
        assert_eq!(
            sqlite_path("sqlite:////var/data/dump.db").unwrap(),
            "/var/data/dump.db"
        );
    }

    #[test]
    fn test_sqlite_path_memory() {
        assert_eq!(sqlite_path("sqlite:///:memory:").unwrap(), ":memory:");
    }

    #[test]
    fn test_sqlite_path_plain() {
        assert_eq!(sqlite_path("dump.db").unwrap(), "dump.db");
        assert_eq!(sqlite_path("/var/dump.db").unwrap(), "/var/dump.db");
    }

    #[test]
    fn test_sqlite_path_rejects_other_schemes() {
        assert!(sqlite_path("mysql://x/y").is_err());
    }
}
