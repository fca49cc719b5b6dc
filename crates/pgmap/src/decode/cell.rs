//! Column decoding and type normalization.
//!
//! A column is first read into a driver-neutral [`Cell`] according to its
//! PostgreSQL type, then normalized into JSON using the target field's
//! [`ValueHint`].

use std::net::IpAddr;

use crate::error::{OrmError, OrmResult};
use crate::record::ValueHint;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Type};

/// A decoded column value before normalization.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(Value),
}

impl Cell {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> OrmResult<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| OrmError::scan(row.columns()[idx].name(), e.to_string()))
}

fn to_json<T: Serialize>(column: &str, value: T) -> OrmResult<Cell> {
    serde_json::to_value(value)
        .map(Cell::Json)
        .map_err(|e| OrmError::scan(column, e.to_string()))
}

/// Read a nullable scalar and serialize it to JSON.
fn json_of<'a, T: FromSql<'a> + Serialize>(row: &'a Row, idx: usize) -> OrmResult<Option<Cell>> {
    get::<T>(row, idx)?
        .map(|v| to_json(row.columns()[idx].name(), v))
        .transpose()
}

/// Read a one-dimensional array; `NULL` elements stay `null`.
fn array_of<'a, T: FromSql<'a> + Serialize>(row: &'a Row, idx: usize) -> OrmResult<Option<Cell>> {
    get::<Vec<Option<T>>>(row, idx)?
        .map(|v| array_cell(row.columns()[idx].name(), v))
        .transpose()
}

pub(crate) fn array_cell<T: Serialize>(column: &str, values: Vec<Option<T>>) -> OrmResult<Cell> {
    to_json(column, values)
}

/// `NUMERIC` keeps its exact digits as text.
pub(crate) fn decimal_cell(value: Decimal) -> Cell {
    Cell::Text(value.to_string())
}

pub(crate) fn inet_cell(value: IpAddr) -> Cell {
    Cell::Text(value.to_string())
}

/// Read column `idx` of `row` according to its declared PostgreSQL type.
///
/// Supported: booleans, integers (`"char"`, `INT2`, `INT4`, `INT8`, `OID`),
/// floats, `NUMERIC` (as exact text), character types, `BYTEA`, `JSON`,
/// `JSONB`, `UUID`, `INET`, dates and times, and one-dimensional arrays of
/// those. Anything else is read as text when the driver allows it and is a
/// [`OrmError::Scan`] otherwise (`INTERVAL`, ranges, geometric types).
pub(crate) fn read_cell(row: &Row, idx: usize) -> OrmResult<Cell> {
    let column = &row.columns()[idx];
    let cell = match *column.type_() {
        Type::BOOL => get::<bool>(row, idx)?.map(Cell::Bool),
        Type::CHAR => get::<i8>(row, idx)?.map(|v| Cell::Int(v.into())),
        Type::INT2 => get::<i16>(row, idx)?.map(|v| Cell::Int(v.into())),
        Type::INT4 => get::<i32>(row, idx)?.map(|v| Cell::Int(v.into())),
        Type::INT8 => get::<i64>(row, idx)?.map(Cell::Int),
        Type::OID => get::<u32>(row, idx)?.map(|v| Cell::Int(v.into())),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(|v| Cell::Float(v.into())),
        Type::FLOAT8 => get::<f64>(row, idx)?.map(Cell::Float),
        Type::NUMERIC => get::<Decimal>(row, idx)?.map(decimal_cell),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get::<String>(row, idx)?.map(Cell::Text)
        }
        Type::BYTEA => get::<Vec<u8>>(row, idx)?.map(Cell::Bytes),
        Type::JSON | Type::JSONB => get::<Value>(row, idx)?.map(Cell::Json),
        Type::UUID => get::<uuid::Uuid>(row, idx)?.map(|v| Cell::Text(v.to_string())),
        Type::INET => get::<IpAddr>(row, idx)?.map(inet_cell),
        Type::DATE => json_of::<chrono::NaiveDate>(row, idx)?,
        Type::TIME => json_of::<chrono::NaiveTime>(row, idx)?,
        Type::TIMESTAMP => json_of::<chrono::NaiveDateTime>(row, idx)?,
        Type::TIMESTAMPTZ => json_of::<chrono::DateTime<chrono::Utc>>(row, idx)?,

        Type::BOOL_ARRAY => array_of::<bool>(row, idx)?,
        Type::INT2_ARRAY => array_of::<i16>(row, idx)?,
        Type::INT4_ARRAY => array_of::<i32>(row, idx)?,
        Type::INT8_ARRAY => array_of::<i64>(row, idx)?,
        Type::FLOAT4_ARRAY => array_of::<f32>(row, idx)?,
        Type::FLOAT8_ARRAY => array_of::<f64>(row, idx)?,
        Type::NUMERIC_ARRAY => array_of::<Decimal>(row, idx)?,
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::BPCHAR_ARRAY | Type::NAME_ARRAY => {
            array_of::<String>(row, idx)?
        }
        Type::JSON_ARRAY | Type::JSONB_ARRAY => array_of::<Value>(row, idx)?,
        Type::UUID_ARRAY => array_of::<uuid::Uuid>(row, idx)?,
        Type::INET_ARRAY => array_of::<IpAddr>(row, idx)?,
        Type::DATE_ARRAY => array_of::<chrono::NaiveDate>(row, idx)?,
        Type::TIMESTAMP_ARRAY => array_of::<chrono::NaiveDateTime>(row, idx)?,
        Type::TIMESTAMPTZ_ARRAY => array_of::<chrono::DateTime<chrono::Utc>>(row, idx)?,

        ref other => match row.try_get::<_, Option<String>>(idx) {
            Ok(v) => v.map(Cell::Text),
            Err(e) => {
                return Err(OrmError::scan(
                    column.name(),
                    format!("unsupported column type {other}: {e}"),
                ));
            }
        },
    };
    Ok(cell.unwrap_or(Cell::Null))
}

/// Byte content is surfaced as text; invalid UTF-8 is replaced, never rejected.
pub(crate) fn bytes_to_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

/// Normalize a cell into the JSON value projected into the record.
///
/// - `NULL` becomes `null`
/// - bytes become text
/// - with [`ValueHint::Bool`], integers become `false` (zero) or `true` (nonzero)
pub(crate) fn normalize(cell: Cell, hint: ValueHint, column: &str) -> OrmResult<Value> {
    if hint == ValueHint::Bool {
        return match cell {
            Cell::Null => Ok(Value::Null),
            Cell::Bool(v) => Ok(Value::Bool(v)),
            Cell::Int(v) => Ok(Value::Bool(v != 0)),
            other => Err(OrmError::scan(
                column,
                format!(
                    "expected an integer-encoded boolean, got {}",
                    other.type_name()
                ),
            )),
        };
    }

    Ok(match cell {
        Cell::Null => Value::Null,
        Cell::Bool(v) => Value::Bool(v),
        Cell::Int(v) => Value::from(v),
        Cell::Float(v) => Value::from(v),
        Cell::Text(v) => Value::String(v),
        Cell::Bytes(v) => Value::String(bytes_to_text(v)),
        Cell::Json(v) => v,
    })
}
