//! Upsert builder: insert-or-update statements synthesized from a record.
//!
//! The statement inserts the selected fields and, on an identity conflict,
//! updates the same fields from a second copy of the bound values:
//!
//! ```text
//! INSERT INTO users (name, email) VALUES ($1, $2)
//! ON CONFLICT (id) DO UPDATE SET name = $3, email = $4
//! RETURNING id
//! ```
//!
//! Field selection:
//! - the identity is included only when assigned (non-zero)
//! - without a snapshot, every present field is included
//! - with a snapshot, every field whose value changed is included; a changed
//!   field that is now unset is bound as `NULL`
//!
//! # Example
//!
//! ```ignore
//! use pgmap::upsert;
//!
//! let mut user = User { id: 0, name: Some("Ana".into()), email: None };
//! let id = upsert(&client, "users", &mut user, None).await?;
//! assert_eq!(user.id, id);
//! ```

#[cfg(test)]
mod tests;

use crate::client::GenericClient;
use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::record::{
    FieldValue, IDENTITY_COLUMN, Record, RecordDescriptor, changed_fields, field_values,
};
use crate::sql::Sql;
use tokio_postgres::Row;
use tokio_postgres::types::{ToSql, Type};

/// A fully assembled upsert, ready to execute.
#[derive(Debug, Clone)]
pub struct UpsertStatement {
    sql: String,
    columns: Vec<&'static str>,
    builder: Sql,
}

impl UpsertStatement {
    /// The rendered statement.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Selected columns, in insert-list order.
    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    /// Number of selected fields (`N`); the statement binds `2N` values.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// `true` when no field was selected (`DEFAULT VALUES` insert).
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Bound values: the insert values followed by the same values again.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.builder.params_ref()
    }
}

/// Indices of the fields that take part in the upsert, in declared order.
pub(crate) fn select_fields(
    descriptor: &RecordDescriptor,
    values: &[FieldValue],
    changed: Option<&[bool]>,
) -> Vec<usize> {
    descriptor
        .fields()
        .iter()
        .zip(values)
        .enumerate()
        .filter(|(idx, (field, value))| {
            if field.is_identity() {
                return value.is_present();
            }
            match changed {
                Some(changed) => changed[*idx],
                None => value.is_present(),
            }
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// Build the upsert for `record` without touching the database.
///
/// Fails with [`OrmError::TagLookup`] when no field maps to the `id` column,
/// before any SQL is assembled.
pub fn build_upsert<R: Record>(
    table: &str,
    record: &R,
    previous: Option<&R>,
) -> OrmResult<UpsertStatement> {
    let descriptor = R::descriptor();
    if descriptor.identity().is_none() {
        return Err(OrmError::tag_lookup(
            descriptor.record_name(),
            IDENTITY_COLUMN,
        ));
    }
    descriptor.validate()?;
    let table = Ident::parse(table)?;

    let values = field_values(record)?;
    let changed = previous
        .map(|previous| changed_fields(record, previous))
        .transpose()?;
    let selected = select_fields(descriptor, &values, changed.as_deref());
    let columns: Vec<&'static str> = selected
        .iter()
        .map(|&idx| descriptor.fields()[idx].column())
        .collect();

    let mut builder = Sql::new("INSERT INTO ");
    builder.push_ident(&table);

    if selected.is_empty() {
        builder.push(" DEFAULT VALUES");
    } else {
        builder.push(" (").push(&columns.join(", ")).push(") VALUES (");
        for (i, &idx) in selected.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push_param(values[idx].param().clone());
        }

        builder.push(") ON CONFLICT (");
        builder.push(IDENTITY_COLUMN).push(") DO UPDATE SET ");
        for (i, &idx) in selected.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder
                .push(columns[i])
                .push(" = ")
                .push_param(values[idx].param().clone());
        }
    }
    builder.push(" RETURNING ").push(IDENTITY_COLUMN);
    builder.validate()?;

    Ok(UpsertStatement {
        sql: builder.to_sql(),
        columns,
        builder,
    })
}

/// Upsert `record` into `table` and write the store's identity back into it.
///
/// `previous` is a snapshot of the same record; when given, only changed
/// fields are written. Returns the identity reported by the store, or the
/// record's current identity if the store returned no row.
pub async fn upsert<R: Record>(
    conn: &impl GenericClient,
    table: &str,
    record: &mut R,
    previous: Option<&R>,
) -> OrmResult<i64> {
    let statement = build_upsert(table, &*record, previous)?;
    tracing::debug!(
        target: "pgmap.sql",
        record = R::descriptor().record_name(),
        fields = statement.len(),
        param_count = statement.len() * 2,
        sql = %statement.sql(),
        "upsert"
    );

    let rows = conn
        .query(statement.sql(), &statement.params_ref())
        .await
        .map_err(|e| {
            tracing::warn!(target: "pgmap.sql", error = %e, sql = %statement.sql(), "upsert rejected");
            OrmError::Execution(e)
        })?;

    let Some(row) = rows.first() else {
        tracing::trace!(target: "pgmap.sql", "upsert returned no row, identity unchanged");
        return Ok(record.identity().unwrap_or_default());
    };

    let id = returned_id(row)?;
    record.set_identity(id)?;
    Ok(id)
}

/// Read the `RETURNING id` value as `i64`.
fn returned_id(row: &Row) -> OrmResult<i64> {
    let column = row
        .columns()
        .first()
        .ok_or_else(|| OrmError::scan(IDENTITY_COLUMN, "RETURNING produced no column"))?;
    let scan = |e: tokio_postgres::Error| OrmError::scan(IDENTITY_COLUMN, e.to_string());
    match *column.type_() {
        Type::INT2 => row.try_get::<_, i16>(0).map(i64::from).map_err(scan),
        Type::INT4 => row.try_get::<_, i32>(0).map(i64::from).map_err(scan),
        Type::INT8 => row.try_get::<_, i64>(0).map_err(scan),
        ref other => Err(OrmError::scan(
            IDENTITY_COLUMN,
            format!("identity column has non-integer type {other}"),
        )),
    }
}
