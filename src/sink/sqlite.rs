//! SQLite sink
//!
//! Buffers rows per table and flushes them in multi-row INSERTs. Tables
//! are created lazily on first sight of each record type: drop-if-exists,
//! then the canned DDL (or a synthesized schema). Indices are created and
//! ANALYZE runs only on a clean close, after all data is in.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::{Connection, SqliteConnection};
use tracing::debug;

use crate::errors::Result;
use crate::models::Record;
use crate::sink::describe::{build_rows, SqlValue};
use crate::sink::dsn::sqlite_path;
use crate::sink::schema::{derive_table, quote_ident, shape_of, split_statements, Dialect, TableSpec};

/// Portable lower bound on SQLite's bind-parameter limit; multi-row
/// inserts are chunked to stay under it.
const MAX_BIND_PARAMS: usize = 999;

pub struct SqliteSink {
    conn: SqliteConnection,
    batch_size: usize,
    specs: HashMap<&'static str, TableSpec>,
    /// Insert column lists for every table, main and junction.
    columns: HashMap<String, Vec<String>>,
    buffers: HashMap<String, Vec<Vec<SqlValue>>>,
    path: Option<PathBuf>,
    created_file: bool,
}

impl SqliteSink {
    /// Open (and if needed create) the target database. The connection
    /// gets the usual bulk-load pragmas and one long-running transaction
    /// that is committed on clean close.
    pub async fn connect(dsn: &str, batch_size: usize) -> Result<SqliteSink> {
        let resolved = sqlite_path(dsn)?;
        let in_memory = resolved == ":memory:";

        let (path, created_file, options) = if in_memory {
            (None, false, SqliteConnectOptions::from_str(":memory:")?)
        } else {
            let path = PathBuf::from(&resolved);
            let created_file = !path.exists();
            let options = SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .pragma("cache_size", "-64000");
            (Some(path), created_file, options)
        };

        let mut conn = SqliteConnection::connect_with(&options).await?;
        sqlx::query("BEGIN").execute(&mut conn).await?;

        Ok(SqliteSink {
            conn,
            batch_size,
            specs: HashMap::new(),
            columns: HashMap::new(),
            buffers: HashMap::new(),
            path,
            created_file,
        })
    }

    /// Buffer one record, flushing any table whose buffer filled up.
    pub async fn write(&mut self, record: &Record) -> Result<()> {
        self.ensure_tables(record).await?;

        let spec = &self.specs[record.type_name()];
        let rows = build_rows(record, spec)?;
        let main_table = spec.table.clone();
        let junction_tables: Vec<String> =
            spec.junctions.iter().map(|j| j.table.clone()).collect();

        self.buffers
            .get_mut(&main_table)
            .expect("buffer registered with table")
            .push(rows.main);
        self.flush_if_full(&main_table).await?;

        for (table, rows) in junction_tables.iter().zip(rows.junctions) {
            if rows.is_empty() {
                continue;
            }
            self.buffers
                .get_mut(table)
                .expect("buffer registered with table")
                .extend(rows);
            self.flush_if_full(table).await?;
        }
        Ok(())
    }

    /// Flush everything, create indices, ANALYZE and commit. Consumes the
    /// sink; use [`SqliteSink::abort`] on error paths instead.
    pub async fn close(mut self) -> Result<()> {
        self.flush_all().await?;

        // canned index DDL is per entity resource; run each file once
        let mut executed: HashSet<&'static str> = HashSet::new();
        for spec in self.specs.values() {
            if let Some(sql) = spec.index_resource {
                if executed.insert(sql) {
                    for statement in split_statements(sql) {
                        sqlx::query(&statement).execute(&mut self.conn).await?;
                    }
                }
            }
        }

        sqlx::query("ANALYZE").execute(&mut self.conn).await?;
        sqlx::query("COMMIT").execute(&mut self.conn).await?;
        self.conn.close().await?;
        Ok(())
    }

    /// Best-effort release for error exits: roll back, close, and remove
    /// the database file if this sink created it.
    pub async fn abort(mut self) {
        let _ = sqlx::query("ROLLBACK").execute(&mut self.conn).await;
        let _ = self.conn.close().await;
        if self.created_file {
            if let Some(path) = &self.path {
                let _ = std::fs::remove_file(path);
                for suffix in ["-wal", "-shm"] {
                    let mut sidecar = path.clone().into_os_string();
                    sidecar.push(suffix);
                    let _ = std::fs::remove_file(sidecar);
                }
            }
        }
    }

    async fn ensure_tables(&mut self, record: &Record) -> Result<()> {
        let type_name = record.type_name();
        if self.specs.contains_key(type_name) {
            return Ok(());
        }

        let spec = derive_table(type_name, shape_of(record), Dialect::Sqlite);
        debug!(table = %spec.table, junctions = spec.junctions.len(), "creating tables");

        for statement in spec.drop_sql.iter().chain(&spec.create_sql) {
            sqlx::query(statement).execute(&mut self.conn).await?;
        }

        self.columns.insert(spec.table.clone(), spec.columns.clone());
        self.buffers.insert(spec.table.clone(), Vec::new());
        for junction in &spec.junctions {
            self.columns
                .insert(junction.table.clone(), junction.columns.clone());
            self.buffers.insert(junction.table.clone(), Vec::new());
        }

        self.specs.insert(type_name, spec);
        Ok(())
    }

    async fn flush_if_full(&mut self, table: &str) -> Result<()> {
        let full = self
            .buffers
            .get(table)
            .is_some_and(|buffer| buffer.len() >= self.batch_size);
        if full {
            self.flush(table).await?;
        }
        Ok(())
    }

    async fn flush(&mut self, table: &str) -> Result<()> {
        let rows = match self.buffers.get_mut(table) {
            Some(buffer) if !buffer.is_empty() => std::mem::take(buffer),
            _ => return Ok(()),
        };
        let columns = &self.columns[table];
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let rows_per_statement = (MAX_BIND_PARAMS / columns.len()).max(1);
        for chunk in rows.chunks(rows_per_statement) {
            let mut builder = sqlx::QueryBuilder::<sqlx::Sqlite>::new(format!(
                "INSERT INTO {} ({}) ",
                quote_ident(table),
                column_list
            ));
            builder.push_values(chunk, |mut binder, row| {
                for value in row {
                    match value {
                        SqlValue::Null => binder.push_bind(None::<String>),
                        SqlValue::Int(i) => binder.push_bind(*i),
                        SqlValue::Real(f) => binder.push_bind(*f),
                        SqlValue::Text(s) => binder.push_bind(s.clone()),
                        SqlValue::Bool(b) => binder.push_bind(*b),
                        SqlValue::Json(json) => binder.push_bind(json.clone()),
                        SqlValue::Array(items) => binder.push_bind(
                            serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string()),
                        ),
                    };
                }
            });
            builder.build().execute(&mut self.conn).await?;
        }
        Ok(())
    }

    async fn flush_all(&mut self) -> Result<()> {
        let tables: Vec<String> = self.buffers.keys().cloned().collect();
        for table in tables {
            self.flush(&table).await?;
        }
        Ok(())
    }
}
