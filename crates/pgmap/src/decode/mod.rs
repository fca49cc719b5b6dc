//! Row decoder: map arbitrary result sets onto [`Record`] types.
//!
//! Each row is decoded into a column-name keyed JSON object, using the record
//! descriptor for type hints, and the object is then projected into the
//! target through `serde`. Fields without a matching column keep their prior
//! value.
//!
//! # Example
//!
//! ```ignore
//! use pgmap::{decode_many, decode_one};
//!
//! let mut user = User::default();
//! decode_one(&client, "SELECT id, name, active FROM users WHERE id = $1", &mut user, &[&7_i64]).await?;
//!
//! let mut users: Vec<User> = Vec::new();
//! decode_many(&client, "SELECT id, name, active FROM users", &mut users, &[]).await?;
//! ```

mod cell;
mod projection;


use crate::client::GenericClient;
use crate::error::{OrmError, OrmResult};
use crate::param::ParamList;
use crate::record::{Record, RecordDescriptor};
use cell::{normalize, read_cell};
use projection::{ColumnSlot, base_object, plan_columns, project};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// How result columns are matched to record fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnBinding {
    /// Match each column to the field with the same column name.
    #[default]
    ByName,
    /// The Nth column is the Nth declared field; column and field counts must agree.
    ByPosition,
}

/// Decode the first row of `sql` into `target`.
///
/// Zero rows leave `target` untouched. On error `target` is not modified.
pub async fn decode_one<T>(
    conn: &impl GenericClient,
    sql: &str,
    target: &mut T,
    params: &[&(dyn ToSql + Sync)],
) -> OrmResult<()>
where
    T: Record + Serialize + DeserializeOwned,
{
    decode_one_with(conn, sql, params, ColumnBinding::ByName, target).await
}

/// Decode every row of `sql`, replacing the contents of `target`.
///
/// Zero rows yield an empty vector. On error `target` is not modified.
pub async fn decode_many<T>(
    conn: &impl GenericClient,
    sql: &str,
    target: &mut Vec<T>,
    params: &[&(dyn ToSql + Sync)],
) -> OrmResult<()>
where
    T: Record + Serialize + DeserializeOwned + Default,
{
    decode_many_with(conn, sql, params, ColumnBinding::ByName, target).await
}

/// A decode call with owned parameters and a configurable column binding.
///
/// # Example
///
/// ```ignore
/// use pgmap::{ColumnBinding, decoder};
///
/// let mut users: Vec<User> = Vec::new();
/// decoder("SELECT id, name, active FROM users WHERE active = $1")
///     .bind(1_i16)
///     .binding(ColumnBinding::ByPosition)
///     .many(&client, &mut users)
///     .await?;
/// ```
#[must_use]
pub struct Decoder {
    sql: String,
    params: ParamList,
    binding: ColumnBinding,
}

/// Start a decode call for `sql` (`$1, $2, ...` placeholders).
pub fn decoder(sql: impl Into<String>) -> Decoder {
    Decoder {
        sql: sql.into(),
        params: ParamList::new(),
        binding: ColumnBinding::default(),
    }
}

impl Decoder {
    /// Bind the next positional parameter.
    pub fn bind<T: ToSql + Sync + Send + 'static>(mut self, value: T) -> Self {
        self.params.push(value);
        self
    }

    /// Choose how columns are matched to fields.
    pub fn binding(mut self, binding: ColumnBinding) -> Self {
        self.binding = binding;
        self
    }

    /// Decode the first row into `target`. See [`decode_one`].
    pub async fn one<T>(&self, conn: &impl GenericClient, target: &mut T) -> OrmResult<()>
    where
        T: Record + Serialize + DeserializeOwned,
    {
        let params = self.params.as_refs();
        decode_one_with(conn, &self.sql, &params, self.binding, target).await
    }

    /// Decode every row into `target`. See [`decode_many`].
    pub async fn many<T>(&self, conn: &impl GenericClient, target: &mut Vec<T>) -> OrmResult<()>
    where
        T: Record + Serialize + DeserializeOwned + Default,
    {
        let params = self.params.as_refs();
        decode_many_with(conn, &self.sql, &params, self.binding, target).await
    }
}

async fn decode_one_with<T>(
    conn: &impl GenericClient,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
    binding: ColumnBinding,
    target: &mut T,
) -> OrmResult<()>
where
    T: Record + Serialize + DeserializeOwned,
{
    let descriptor = T::descriptor();
    let rows = fetch_rows(conn, sql, params, descriptor).await?;
    let Some(first) = rows.first() else {
        tracing::trace!(target: "pgmap.sql", record = descriptor.record_name(), "no rows, target unchanged");
        return Ok(());
    };

    let slots = plan_row(first, descriptor, binding)?;
    let object = row_object(first, &slots)?;
    *target = project(base_object(&*target)?, object)?;
    Ok(())
}

async fn decode_many_with<T>(
    conn: &impl GenericClient,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
    binding: ColumnBinding,
    target: &mut Vec<T>,
) -> OrmResult<()>
where
    T: Record + Serialize + DeserializeOwned + Default,
{
    let descriptor = T::descriptor();
    let rows = fetch_rows(conn, sql, params, descriptor).await?;
    let Some(first) = rows.first() else {
        target.clear();
        return Ok(());
    };

    let slots = plan_row(first, descriptor, binding)?;
    let base = base_object(&T::default())?;
    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        records.push(project(base.clone(), row_object(row, &slots)?)?);
    }
    tracing::trace!(target: "pgmap.sql", record = descriptor.record_name(), rows = records.len(), "decoded");
    *target = records;
    Ok(())
}

async fn fetch_rows(
    conn: &impl GenericClient,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
    descriptor: &RecordDescriptor,
) -> OrmResult<Vec<Row>> {
    descriptor.validate()?;
    tracing::debug!(
        target: "pgmap.sql",
        record = descriptor.record_name(),
        param_count = params.len(),
        sql = %sql,
        "decode"
    );
    conn.query(sql, params).await.map_err(|e| {
        tracing::warn!(target: "pgmap.sql", error = %e, sql = %sql, "query failed");
        OrmError::Query(e)
    })
}

fn plan_row(
    row: &Row,
    descriptor: &RecordDescriptor,
    binding: ColumnBinding,
) -> OrmResult<Vec<ColumnSlot>> {
    let columns: Vec<&str> = row.columns().iter().map(|c| c.name()).collect();
    plan_columns(&columns, descriptor, binding).inspect_err(|e| {
        tracing::warn!(target: "pgmap.sql", error = %e, "scan failed");
    })
}

fn row_object(row: &Row, slots: &[ColumnSlot]) -> OrmResult<Map<String, Value>> {
    let mut object = Map::new();
    for (idx, slot) in slots.iter().enumerate() {
        let column = row.columns()[idx].name();
        let value = read_cell(row, idx)
            .and_then(|cell| normalize(cell, slot.hint, column))
            .inspect_err(|e| {
                tracing::warn!(target: "pgmap.sql", error = %e, "scan failed");
            })?;
        object.insert(slot.key.clone(), value);
    }
    Ok(object)
}
