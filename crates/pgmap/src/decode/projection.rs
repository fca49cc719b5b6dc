//! Binding result columns to record fields and projecting rows into records.

use super::ColumnBinding;
use crate::error::{OrmError, OrmResult};
use crate::record::{RecordDescriptor, ValueHint};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Where a result column lands in the row object, and how to decode it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnSlot {
    pub(crate) key: String,
    pub(crate) hint: ValueHint,
}

/// Bind result columns to descriptors once per result set.
///
/// - [`ColumnBinding::ByName`]: a column matching a field's column name takes
///   that field's hint and key; other columns keep their own name.
/// - [`ColumnBinding::ByPosition`]: column N takes field N's hint and keeps its
///   own name as key; the counts must agree.
pub(crate) fn plan_columns(
    columns: &[&str],
    descriptor: &RecordDescriptor,
    binding: ColumnBinding,
) -> OrmResult<Vec<ColumnSlot>> {
    match binding {
        ColumnBinding::ByName => Ok(columns
            .iter()
            .map(|column| match descriptor.field_by_column(column) {
                Some(field) => ColumnSlot {
                    key: field.key().to_string(),
                    hint: field.hint(),
                },
                None => ColumnSlot {
                    key: (*column).to_string(),
                    hint: ValueHint::Plain,
                },
            })
            .collect()),
        ColumnBinding::ByPosition => {
            if columns.len() != descriptor.len() {
                let column = columns
                    .get(descriptor.len())
                    .copied()
                    .or_else(|| descriptor.fields().get(columns.len()).map(|f| f.column()))
                    .unwrap_or("*");
                return Err(OrmError::scan(
                    column,
                    format!(
                        "{} binds {} fields by position, query returned {} columns",
                        descriptor.record_name(),
                        descriptor.len(),
                        columns.len()
                    ),
                ));
            }
            Ok(columns
                .iter()
                .zip(descriptor.fields())
                .map(|(column, field)| ColumnSlot {
                    key: (*column).to_string(),
                    hint: field.hint(),
                })
                .collect())
        }
    }
}

/// Serialize a record into the object rows are merged over.
pub(crate) fn base_object<T: Serialize>(record: &T) -> OrmResult<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(OrmError::projection(format!(
            "record must serialize to an object, got {}",
            json_type(&other)
        ))),
    }
}

/// Merge a row object over `base` and deserialize the result.
///
/// Keys missing from `row` keep their value from `base`.
pub(crate) fn project<T: DeserializeOwned>(
    mut base: Map<String, Value>,
    row: Map<String, Value>,
) -> OrmResult<T> {
    base.extend(row);
    Ok(serde_json::from_value(Value::Object(base))?)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
