//! Relational schema derivation
//!
//! Each record type carries a static shape: field names plus just enough
//! type information to derive a table. Collections are decomposed into
//! junction tables keyed by the parent id, unless a canned DDL resource
//! declares the field as a column of the parent table, in which case the
//! resource wins and the value is stored inline.

use std::collections::HashSet;

use crate::models::Record;

/// Column-level SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Boolean,
    Bytes,
}

/// Element type of a collection field.
#[derive(Debug, Clone, Copy)]
pub enum ListElem {
    Integer,
    Text,
    Record(&'static RecordShape),
}

/// How one record field maps to storage.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    Scalar(ColumnType),
    /// Single nested record, JSON-encoded into one column.
    Nested,
    /// Homogeneous collection, junction-table candidate.
    List(ListElem),
}

#[derive(Debug)]
pub struct FieldShape {
    pub name: &'static str,
    pub ty: FieldType,
}

#[derive(Debug)]
pub struct RecordShape {
    pub fields: &'static [FieldShape],
}

const fn field(name: &'static str, ty: FieldType) -> FieldShape {
    FieldShape { name, ty }
}

const INT: FieldType = FieldType::Scalar(ColumnType::Integer);
const TEXT: FieldType = FieldType::Scalar(ColumnType::Text);
const BOOL: FieldType = FieldType::Scalar(ColumnType::Boolean);
const TEXT_LIST: FieldType = FieldType::List(ListElem::Text);

pub static ARTIST_REF_SHAPE: RecordShape = RecordShape {
    fields: &[field("id", INT), field("name", TEXT)],
};

pub static ARTIST_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("id", INT),
        field("name", TEXT),
        field("real_name", TEXT),
        field("profile", TEXT),
        field("data_quality", TEXT),
        field("urls", TEXT_LIST),
        field("name_variations", TEXT_LIST),
        field("aliases", FieldType::List(ListElem::Record(&ARTIST_REF_SHAPE))),
        field("members", FieldType::List(ListElem::Record(&ARTIST_REF_SHAPE))),
        field("groups", FieldType::List(ListElem::Record(&ARTIST_REF_SHAPE))),
    ],
};

pub static LABEL_REF_SHAPE: RecordShape = RecordShape {
    fields: &[field("id", INT), field("name", TEXT)],
};

pub static LABEL_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("id", INT),
        field("name", TEXT),
        field("contact_info", TEXT),
        field("profile", TEXT),
        field("data_quality", TEXT),
        field("urls", TEXT_LIST),
        field("sub_labels", FieldType::List(ListElem::Record(&LABEL_REF_SHAPE))),
        field("parent_label", FieldType::Nested),
    ],
};

pub static CREDIT_ARTIST_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("id", INT),
        field("artist_name_variation", TEXT),
        field("join", TEXT),
        field("name", TEXT),
    ],
};

pub static VIDEO_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("description", TEXT),
        field("duration", INT),
        field("embed", BOOL),
        field("src", TEXT),
        field("title", TEXT),
    ],
};

pub static MASTER_RELEASE_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("id", INT),
        field("data_quality", TEXT),
        field("main_release", INT),
        field("notes", TEXT),
        field("title", TEXT),
        field("year", INT),
        field("artists", FieldType::List(ListElem::Record(&CREDIT_ARTIST_SHAPE))),
        field("genres", TEXT_LIST),
        field("styles", TEXT_LIST),
        field("videos", FieldType::List(ListElem::Record(&VIDEO_SHAPE))),
    ],
};

pub static EXTRA_ARTIST_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("id", INT),
        field("artist_name_variation", TEXT),
        field("name", TEXT),
        field("role", TEXT),
        field("tracks", TEXT),
    ],
};

pub static RELEASE_LABEL_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("id", INT),
        field("catalog_number", TEXT),
        field("name", TEXT),
    ],
};

pub static FORMAT_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("name", TEXT),
        field("quantity", TEXT),
        field("text", TEXT),
        field("descriptions", TEXT_LIST),
    ],
};

pub static IDENTIFIER_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("type", TEXT),
        field("description", TEXT),
        field("value", TEXT),
    ],
};

pub static COMPANY_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("id", INT),
        field("catalog_number", TEXT),
        field("entity_type", INT),
        field("entity_type_name", TEXT),
        field("name", TEXT),
    ],
};

pub static SERIES_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("id", INT),
        field("catalog_number", TEXT),
        field("name", TEXT),
    ],
};

pub static SUB_TRACK_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("position", TEXT),
        field("title", TEXT),
        field("duration", TEXT),
        field("artists", FieldType::List(ListElem::Record(&CREDIT_ARTIST_SHAPE))),
        field("extra_artists", FieldType::List(ListElem::Record(&EXTRA_ARTIST_SHAPE))),
    ],
};

pub static TRACK_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("position", TEXT),
        field("title", TEXT),
        field("duration", TEXT),
        field("artists", FieldType::List(ListElem::Record(&CREDIT_ARTIST_SHAPE))),
        field("extra_artists", FieldType::List(ListElem::Record(&EXTRA_ARTIST_SHAPE))),
        field("sub_tracks", FieldType::List(ListElem::Record(&SUB_TRACK_SHAPE))),
    ],
};

pub static RELEASE_SHAPE: RecordShape = RecordShape {
    fields: &[
        field("id", INT),
        field("country", TEXT),
        field("data_quality", TEXT),
        field("is_main_release", BOOL),
        field("master_id", INT),
        field("notes", TEXT),
        field("released", TEXT),
        field("status", TEXT),
        field("title", TEXT),
        field("artists", FieldType::List(ListElem::Record(&CREDIT_ARTIST_SHAPE))),
        field("companies", FieldType::List(ListElem::Record(&COMPANY_SHAPE))),
        field("extra_artists", FieldType::List(ListElem::Record(&EXTRA_ARTIST_SHAPE))),
        field("formats", FieldType::List(ListElem::Record(&FORMAT_SHAPE))),
        field("genres", TEXT_LIST),
        field("identifiers", FieldType::List(ListElem::Record(&IDENTIFIER_SHAPE))),
        field("labels", FieldType::List(ListElem::Record(&RELEASE_LABEL_SHAPE))),
        field("series", FieldType::List(ListElem::Record(&SERIES_SHAPE))),
        field("styles", TEXT_LIST),
        field("tracklist", FieldType::List(ListElem::Record(&TRACK_SHAPE))),
        field("videos", FieldType::List(ListElem::Record(&VIDEO_SHAPE))),
    ],
};

/// Static shape of a record.
pub fn shape_of(record: &Record) -> &'static RecordShape {
    match record {
        Record::Artist(_) => &ARTIST_SHAPE,
        Record::Label(_) => &LABEL_SHAPE,
        Record::MasterRelease(_) => &MASTER_RELEASE_SHAPE,
        Record::Release(_) => &RELEASE_SHAPE,
    }
}

/// Target database dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgresql,
}

impl Dialect {
    pub fn column_type(self, ty: ColumnType) -> &'static str {
        match (self, ty) {
            (Dialect::Sqlite, ColumnType::Integer) => "INTEGER",
            (Dialect::Sqlite, ColumnType::Float) => "REAL",
            (Dialect::Sqlite, ColumnType::Text) => "TEXT",
            (Dialect::Sqlite, ColumnType::Boolean) => "INTEGER",
            (Dialect::Sqlite, ColumnType::Bytes) => "BLOB",
            (Dialect::Postgresql, ColumnType::Integer) => "BIGINT",
            (Dialect::Postgresql, ColumnType::Float) => "DOUBLE PRECISION",
            (Dialect::Postgresql, ColumnType::Text) => "TEXT",
            (Dialect::Postgresql, ColumnType::Boolean) => "BOOLEAN",
            (Dialect::Postgresql, ColumnType::Bytes) => "BYTEA",
        }
    }

    /// Column type for a JSON-encoded nested record.
    fn nested_type(self) -> &'static str {
        match self {
            Dialect::Sqlite => "TEXT",
            Dialect::Postgresql => "JSONB",
        }
    }

    /// Column type for a collection stored inline (canned DDL override).
    fn inline_list_type(self, elem: ListElem) -> &'static str {
        match (self, elem) {
            (Dialect::Sqlite, _) => "TEXT",
            (Dialect::Postgresql, ListElem::Text) => "TEXT[]",
            (Dialect::Postgresql, ListElem::Integer) => "BIGINT[]",
            (Dialect::Postgresql, ListElem::Record(_)) => "JSONB",
        }
    }
}

/// Fixed singularization heuristic used for junction table and column
/// names: trailing `ies` becomes `y`, else `es` and `s` are stripped.
pub fn singularize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = name.strip_suffix("es") {
        return stem.to_string();
    }
    if let Some(stem) = name.strip_suffix('s') {
        return stem.to_string();
    }
    name.to_string()
}

/// Quote an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// One junction table: child rows linked to the parent by id.
#[derive(Debug, Clone)]
pub struct JunctionSpec {
    /// Record field feeding this table.
    pub field: &'static str,
    pub table: String,
    pub parent_column: String,
    /// All columns including the parent id, in insert order.
    pub columns: Vec<String>,
    pub elem: ListElem,
}

/// Derived storage plan for one record type.
#[derive(Debug)]
pub struct TableSpec {
    pub table: String,
    pub shape: &'static RecordShape,
    /// Main-table columns in field order.
    pub columns: Vec<String>,
    /// Collection fields stored inline because the canned DDL says so.
    pub inline_fields: Vec<&'static str>,
    pub junctions: Vec<JunctionSpec>,
    pub drop_sql: Vec<String>,
    pub create_sql: Vec<String>,
    /// Canned index DDL for this entity. Sinks run each distinct resource
    /// once on clean close.
    pub index_resource: Option<&'static str>,
}

impl TableSpec {
    /// Index into `junctions` for a field, if it is junction-stored.
    pub fn junction_index(&self, field: &str) -> Option<usize> {
        self.junctions.iter().position(|j| j.field == field)
    }
}

#[derive(Debug, Clone, Copy)]
enum SqlCategory {
    Tables,
    Indices,
}

/// Packaged DDL, one resource per entity and dialect. The resource name is
/// the entity's main table; junction tables live in their parent's file.
fn canned_sql(dialect: Dialect, category: SqlCategory, table: &str) -> Option<&'static str> {
    match (dialect, category, table) {
        (Dialect::Sqlite, SqlCategory::Tables, "artist") => {
            Some(include_str!("sql/sqlite/tables/artist.sql"))
        }
        (Dialect::Sqlite, SqlCategory::Tables, "label") => {
            Some(include_str!("sql/sqlite/tables/label.sql"))
        }
        (Dialect::Sqlite, SqlCategory::Tables, "masterrelease") => {
            Some(include_str!("sql/sqlite/tables/masterrelease.sql"))
        }
        (Dialect::Sqlite, SqlCategory::Tables, "release") => {
            Some(include_str!("sql/sqlite/tables/release.sql"))
        }
        (Dialect::Sqlite, SqlCategory::Indices, "artist") => {
            Some(include_str!("sql/sqlite/indices/artist.sql"))
        }
        (Dialect::Sqlite, SqlCategory::Indices, "label") => {
            Some(include_str!("sql/sqlite/indices/label.sql"))
        }
        (Dialect::Sqlite, SqlCategory::Indices, "masterrelease") => {
            Some(include_str!("sql/sqlite/indices/masterrelease.sql"))
        }
        (Dialect::Sqlite, SqlCategory::Indices, "release") => {
            Some(include_str!("sql/sqlite/indices/release.sql"))
        }
        (Dialect::Postgresql, SqlCategory::Tables, "artist") => {
            Some(include_str!("sql/postgresql/tables/artist.sql"))
        }
        (Dialect::Postgresql, SqlCategory::Tables, "label") => {
            Some(include_str!("sql/postgresql/tables/label.sql"))
        }
        (Dialect::Postgresql, SqlCategory::Tables, "masterrelease") => {
            Some(include_str!("sql/postgresql/tables/masterrelease.sql"))
        }
        (Dialect::Postgresql, SqlCategory::Tables, "release") => {
            Some(include_str!("sql/postgresql/tables/release.sql"))
        }
        (Dialect::Postgresql, SqlCategory::Indices, "artist") => {
            Some(include_str!("sql/postgresql/indices/artist.sql"))
        }
        (Dialect::Postgresql, SqlCategory::Indices, "label") => {
            Some(include_str!("sql/postgresql/indices/label.sql"))
        }
        (Dialect::Postgresql, SqlCategory::Indices, "masterrelease") => {
            Some(include_str!("sql/postgresql/indices/masterrelease.sql"))
        }
        (Dialect::Postgresql, SqlCategory::Indices, "release") => {
            Some(include_str!("sql/postgresql/indices/release.sql"))
        }
        _ => None,
    }
}

/// Split a DDL resource into executable statements.
pub fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extract the column names of `table`'s CREATE TABLE statement from a DDL
/// resource. Used to detect collection fields the canned schema keeps
/// inline on the parent table.
fn canned_table_columns(sql: &str, table: &str) -> HashSet<String> {
    let mut columns = HashSet::new();
    for statement in split_statements(sql) {
        let lowered = statement.to_lowercase();
        let Some(rest) = lowered.strip_prefix("create table ") else {
            continue;
        };
        let name = rest
            .split('(')
            .next()
            .unwrap_or("")
            .trim()
            .trim_matches('"');
        if name != table {
            continue;
        }

        let Some(open) = statement.find('(') else {
            continue;
        };
        let Some(close) = statement.rfind(')') else {
            continue;
        };
        let body = &statement[open + 1..close];

        // split on top-level commas only (array types contain none, but
        // constraint clauses contain nested parens)
        let mut depth = 0usize;
        let mut item = String::new();
        let mut items = Vec::new();
        for c in body.chars() {
            match c {
                '(' => {
                    depth += 1;
                    item.push(c);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    item.push(c);
                }
                ',' if depth == 0 => {
                    items.push(std::mem::take(&mut item));
                }
                _ => item.push(c),
            }
        }
        items.push(item);

        for item in items {
            let item = item.trim();
            let Some(first) = item.split_whitespace().next() else {
                continue;
            };
            let word = first.trim_matches('"');
            if matches!(
                word.to_uppercase().as_str(),
                "PRIMARY" | "FOREIGN" | "UNIQUE" | "CHECK" | "CONSTRAINT"
            ) {
                continue;
            }
            columns.insert(word.to_string());
        }
    }
    columns
}

/// Derive the storage plan for one record type.
pub fn derive_table(type_name: &str, shape: &'static RecordShape, dialect: Dialect) -> TableSpec {
    let table = type_name.to_lowercase();
    let canned = canned_sql(dialect, SqlCategory::Tables, &table);
    let canned_columns = canned
        .map(|sql| canned_table_columns(sql, &table))
        .unwrap_or_default();

    let mut columns = Vec::new();
    let mut inline_fields = Vec::new();
    let mut junctions = Vec::new();

    for field in shape.fields {
        match field.ty {
            FieldType::List(elem) => {
                if canned_columns.contains(field.name) {
                    // the SQL resource wins over junction derivation
                    inline_fields.push(field.name);
                    columns.push(field.name.to_string());
                } else {
                    let singular = singularize(field.name);
                    let junction_table = format!("{table}_{singular}");
                    let parent_column = format!("{table}_id");
                    let mut junction_columns = vec![parent_column.clone()];
                    match elem {
                        ListElem::Integer => junction_columns.push(format!("{singular}_id")),
                        ListElem::Text => junction_columns.push(singular.clone()),
                        ListElem::Record(elem_shape) => junction_columns
                            .extend(elem_shape.fields.iter().map(|f| f.name.to_string())),
                    }
                    junctions.push(JunctionSpec {
                        field: field.name,
                        table: junction_table,
                        parent_column,
                        columns: junction_columns,
                        elem,
                    });
                }
            }
            _ => columns.push(field.name.to_string()),
        }
    }

    let mut drop_sql = vec![format!("DROP TABLE IF EXISTS {}", quote_ident(&table))];
    for junction in &junctions {
        drop_sql.push(format!(
            "DROP TABLE IF EXISTS {}",
            quote_ident(&junction.table)
        ));
    }

    let create_sql = match canned {
        Some(sql) => split_statements(sql),
        None => synthesize_ddl(&table, shape, &junctions, dialect),
    };

    let index_resource = canned_sql(dialect, SqlCategory::Indices, &table);

    TableSpec {
        table,
        shape,
        columns,
        inline_fields,
        junctions,
        drop_sql,
        create_sql,
        index_resource,
    }
}

fn synthesize_ddl(
    table: &str,
    shape: &'static RecordShape,
    junctions: &[JunctionSpec],
    dialect: Dialect,
) -> Vec<String> {
    let mut statements = Vec::new();

    let mut columns = Vec::new();
    for (i, field) in shape.fields.iter().enumerate() {
        let sql_type = match field.ty {
            FieldType::Scalar(ty) => {
                let mapped = dialect.column_type(ty);
                if i == 0 && ty == ColumnType::Integer {
                    columns.push(format!("{} {} PRIMARY KEY", quote_ident(field.name), mapped));
                    continue;
                }
                mapped
            }
            FieldType::Nested => dialect.nested_type(),
            FieldType::List(_) => continue, // junction fields live elsewhere
        };
        columns.push(format!("{} {}", quote_ident(field.name), sql_type));
    }
    statements.push(format!(
        "CREATE TABLE {} ({})",
        quote_ident(table),
        columns.join(", ")
    ));

    for junction in junctions {
        let parent = quote_ident(&junction.parent_column);
        let int_type = dialect.column_type(ColumnType::Integer);
        let mut columns = vec![format!("{parent} {int_type} NOT NULL")];
        match junction.elem {
            ListElem::Integer => {
                let ref_column = quote_ident(&junction.columns[1]);
                columns.push(format!("{ref_column} {int_type} NOT NULL"));
                columns.push(format!("PRIMARY KEY ({parent}, {ref_column})"));
            }
            ListElem::Text => {
                columns.push(format!("{} TEXT NOT NULL", quote_ident(&junction.columns[1])));
            }
            ListElem::Record(elem_shape) => {
                for field in elem_shape.fields {
                    let sql_type = match field.ty {
                        FieldType::Scalar(ty) => dialect.column_type(ty),
                        FieldType::Nested => dialect.nested_type(),
                        FieldType::List(elem) => dialect.inline_list_type(elem),
                    };
                    columns.push(format!("{} {}", quote_ident(field.name), sql_type));
                }
            }
        }
        statements.push(format!(
            "CREATE TABLE {} ({})",
            quote_ident(&junction.table),
            columns.join(", ")
        ));
    }

    statements
}
