//! PostgreSQL sink
//!
//! Same buffering contract as the SQLite sink, but flushes stream the
//! buffered rows through `COPY ... FROM STDIN` in text format, which is
//! the fastest bulk path the server offers. An optional commit interval
//! bounds the work lost if a very long load crashes mid-way.

use std::collections::{HashMap, HashSet};

use sqlx::{Connection, PgConnection};
use tracing::debug;

use crate::errors::Result;
use crate::models::Record;
use crate::sink::describe::{build_rows, SqlValue};
use crate::sink::schema::{derive_table, quote_ident, shape_of, split_statements, Dialect, TableSpec};

pub struct PostgresSink {
    conn: PgConnection,
    batch_size: usize,
    /// Rows between forced commits; `None` means a single transaction.
    commit_interval: Option<u64>,
    rows_since_commit: u64,
    specs: HashMap<&'static str, TableSpec>,
    columns: HashMap<String, Vec<String>>,
    buffers: HashMap<String, Vec<Vec<SqlValue>>>,
}

impl PostgresSink {
    pub async fn connect(
        dsn: &str,
        batch_size: usize,
        commit_interval: Option<u64>,
    ) -> Result<PostgresSink> {
        let mut conn = PgConnection::connect(dsn).await?;
        sqlx::query("BEGIN").execute(&mut conn).await?;

        Ok(PostgresSink {
            conn,
            batch_size,
            commit_interval,
            rows_since_commit: 0,
            specs: HashMap::new(),
            columns: HashMap::new(),
            buffers: HashMap::new(),
        })
    }

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
        self.rows_since_commit += 1;
        self.flush_if_full(&main_table).await?;

        for (table, rows) in junction_tables.iter().zip(rows.junctions) {
            if rows.is_empty() {
                continue;
            }
            self.rows_since_commit += rows.len() as u64;
            self.buffers
                .get_mut(table)
                .expect("buffer registered with table")
                .extend(rows);
            self.flush_if_full(table).await?;
        }

        if let Some(interval) = self.commit_interval {
            if self.rows_since_commit >= interval {
                self.flush_all().await?;
                sqlx::query("COMMIT").execute(&mut self.conn).await?;
                sqlx::query("BEGIN").execute(&mut self.conn).await?;
                self.rows_since_commit = 0;
            }
        }
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        self.flush_all().await?;

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

        sqlx::query("COMMIT").execute(&mut self.conn).await?;
        self.conn.close().await?;
        Ok(())
    }

    /// Best-effort release for error exits: roll back and close.
    pub async fn abort(mut self) {
        let _ = sqlx::query("ROLLBACK").execute(&mut self.conn).await;
        let _ = self.conn.close().await;
    }

    async fn ensure_tables(&mut self, record: &Record) -> Result<()> {
        let type_name = record.type_name();
        if self.specs.contains_key(type_name) {
            return Ok(());
        }

        let spec = derive_table(type_name, shape_of(record), Dialect::Postgresql);
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
        let statement = format!(
            "COPY {} ({}) FROM STDIN",
            quote_ident(table),
            column_list
        );

        let mut data = String::new();
        for row in &rows {
            encode_copy_row(row, &mut data);
        }

        let mut copy = self.conn.copy_in_raw(&statement).await?;
        copy.send(data.as_bytes()).await?;
        copy.finish().await?;
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

/// Render one row in COPY text format: tab-separated fields, `\N` nulls,
/// newline-terminated.
fn encode_copy_row(row: &[SqlValue], out: &mut String) {
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            out.push('\t');
        }
        encode_copy_field(value, out);
    }
    out.push('\n');
}

fn encode_copy_field(value: &SqlValue, out: &mut String) {
    match value {
        SqlValue::Null => out.push_str("\\N"),
        SqlValue::Int(i) => out.push_str(&i.to_string()),
        SqlValue::Real(f) => out.push_str(&f.to_string()),
        SqlValue::Bool(true) => out.push('t'),
        SqlValue::Bool(false) => out.push('f'),
        SqlValue::Text(s) | SqlValue::Json(s) => escape_copy_text(s, out),
        SqlValue::Array(items) => {
            let literal = array_literal(items);
            escape_copy_text(&literal, out);
        }
    }
}

/// Escape the characters COPY text format treats specially. Applied last,
/// after any array-literal quoting.
fn escape_copy_text(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
}

/// Build a PostgreSQL array literal with every element quoted.
fn array_literal(items: &[String]) -> String {
    let mut literal = String::from("{");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            literal.push(',');
        }
        literal.push('"');
        for c in item.chars() {
            match c {
                '"' => literal.push_str("\\\""),
                '\\' => literal.push_str("\\\\"),
                _ => literal.push(c),
            }
        }
        literal.push('"');
    }
    literal.push('}');
    literal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(row: &[SqlValue]) -> String {
        let mut out = String::new();
        encode_copy_row(row, &mut out);
        out
    }

    #[test]
    fn test_copy_row_basic() {
        let row = vec![
            SqlValue::Int(1),
            SqlValue::Text("EMI".into()),
            SqlValue::Null,
            SqlValue::Bool(true),
        ];
        assert_eq!(encode(&row), "1\tEMI\t\\N\tt\n");
    }

    #[test]
    fn test_copy_text_escaping() {
        let row = vec![SqlValue::Text("a\tb\nc\\d".into())];
        assert_eq!(encode(&row), "a\\tb\\nc\\\\d\n");
    }

    #[test]
    fn test_copy_array_literal() {
        let row = vec![SqlValue::Array(vec!["Rock".into(), "Pop Rock".into()])];
        assert_eq!(encode(&row), "{\"Rock\",\"Pop Rock\"}\n");
    }

    #[test]
    fn test_copy_array_with_quotes_and_backslashes() {
        let literal = array_literal(&["say \"hi\"".into(), "back\\slash".into()]);
        assert_eq!(literal, "{\"say \\\"hi\\\"\",\"back\\\\slash\"}");

        // COPY escaping then doubles the backslashes
        let row = vec![SqlValue::Array(vec!["say \"hi\"".into()])];
        assert_eq!(encode(&row), "{\"say \\\\\"hi\\\\\"\"}\n");
    }

    #[test]
    fn test_copy_json_field() {
        let row = vec![SqlValue::Json("{\"id\":500}".into())];
        assert_eq!(encode(&row), "{\"id\":500}\n");
    }

    #[test]
    fn test_empty_array() {
        let row = vec![SqlValue::Array(Vec::new())];
        assert_eq!(encode(&row), "{}\n");
    }
}
