//! Record-to-row decomposition
//!
//! Splits one record into its main-table row and one row per collection
//! element for each junction table, following the [`TableSpec`] derived
//! for the target dialect. Values are kept in a small SQL value enum so
//! the SQLite binder and the PostgreSQL COPY encoder can render them
//! appropriately.

use serde_json::Value;

use crate::errors::{DumpError, Result};
use crate::models::Record;
use crate::sink::schema::{ColumnType, FieldShape, FieldType, ListElem, RecordShape, TableSpec};

/// One cell bound into an INSERT or rendered into a COPY stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    /// JSON-encoded complex value (nested record or record list).
    Json(String),
    /// Primitive string list kept inline; native array for PostgreSQL,
    /// JSON text for SQLite.
    Array(Vec<String>),
}

/// Decomposed record: the main row plus junction rows grouped in the same
/// order as `spec.junctions`.
#[derive(Debug)]
pub struct RowSet {
    pub main: Vec<SqlValue>,
    pub junctions: Vec<Vec<Vec<SqlValue>>>,
}

/// Split a record into rows according to the derived table spec.
pub fn build_rows(record: &Record, spec: &TableSpec) -> Result<RowSet> {
    let value = serde_json::to_value(record)?;
    let object = value
        .as_object()
        .ok_or_else(|| DumpError::Output(format!("{} is not an object", record.type_name())))?;

    // the first field is the entity id, which keys every junction row
    let id_field = spec.shape.fields[0].name;
    let parent_id = scalar_value(object.get(id_field), &FieldType::Scalar(ColumnType::Integer))?;

    let mut main = Vec::with_capacity(spec.columns.len());
    let mut junctions = vec![Vec::new(); spec.junctions.len()];

    for field in spec.shape.fields {
        let field_value = object.get(field.name);
        match field.ty {
            FieldType::List(elem) => match spec.junction_index(field.name) {
                Some(index) => {
                    junctions[index] = junction_rows(&parent_id, field, elem, field_value)?;
                }
                None => main.push(inline_list_value(field, elem, field_value)?),
            },
            ref ty => main.push(scalar_value(field_value, ty)?),
        }
    }

    Ok(RowSet { main, junctions })
}

fn scalar_value(value: Option<&Value>, ty: &FieldType) -> Result<SqlValue> {
    let Some(value) = value else {
        return Ok(SqlValue::Null);
    };
    Ok(match (ty, value) {
        (_, Value::Null) => SqlValue::Null,
        (FieldType::Nested, value) => SqlValue::Json(serde_json::to_string(value)?),
        (_, Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Int(i),
            None => match n.as_f64() {
                Some(f) => SqlValue::Real(f),
                None => SqlValue::Text(n.to_string()),
            },
        },
        (_, Value::String(s)) => SqlValue::Text(s.clone()),
        (_, Value::Bool(b)) => SqlValue::Bool(*b),
        // a complex value in a scalar position is JSON-encoded
        (_, value) => SqlValue::Json(serde_json::to_string(value)?),
    })
}

fn inline_list_value(
    field: &FieldShape,
    elem: ListElem,
    value: Option<&Value>,
) -> Result<SqlValue> {
    let Some(Value::Array(items)) = value else {
        return Ok(SqlValue::Null);
    };
    match elem {
        ListElem::Text => Ok(SqlValue::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(DumpError::Output(format!(
                        "expected string element in {}: {other}",
                        field.name
                    ))),
                })
                .collect::<Result<Vec<_>>>()?,
        )),
        ListElem::Integer | ListElem::Record(_) => {
            Ok(SqlValue::Json(serde_json::to_string(items)?))
        }
    }
}

fn junction_rows(
    parent_id: &SqlValue,
    field: &FieldShape,
    elem: ListElem,
    value: Option<&Value>,
) -> Result<Vec<Vec<SqlValue>>> {
    let Some(Value::Array(items)) = value else {
        return Ok(Vec::new());
    };

    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let mut row = vec![parent_id.clone()];
        match elem {
            ListElem::Integer | ListElem::Text => {
                row.push(scalar_value(Some(item), &FieldType::Scalar(ColumnType::Text))?);
            }
            ListElem::Record(elem_shape) => {
                flatten_element(elem_shape, item, field.name, &mut row)?;
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Flatten one collection element into junction-row cells. Nested lists
/// inside the element (track credits, format descriptions) stay in one
/// cell: string lists as arrays, record lists as JSON.
fn flatten_element(
    shape: &'static RecordShape,
    item: &Value,
    field_name: &str,
    row: &mut Vec<SqlValue>,
) -> Result<()> {
    let object = item.as_object().ok_or_else(|| {
        DumpError::Output(format!("expected object element in {field_name}: {item}"))
    })?;

    for field in shape.fields {
        let value = object.get(field.name);
        match field.ty {
            FieldType::List(elem) => row.push(inline_list_value(field, elem, value)?),
            ref ty => row.push(scalar_value(value, ty)?),
        }
    }
    Ok(())
}
