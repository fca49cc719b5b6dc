//! Record descriptors: the structural metadata the decoder and the upsert
//! builder work from.
//!
//! A [`Record`] exposes an ordered, flattened list of [`FieldDescriptor`]s
//! (built once per type and cached) plus accessors that walk the fields in the
//! same order. Implementations are normally generated with
//! `#[derive(Record)]`.
//!
//! # Example
//!
//! ```ignore
//! use pgmap::Record;
//!
//! #[derive(Record, serde::Serialize, serde::Deserialize, Default)]
//! struct User {
//!     id: i64,
//!     name: Option<String>,
//!     #[orm(column = "email_address")]
//!     email: Option<String>,
//! }
//! ```

use crate::error::{OrmError, OrmResult};
use crate::ident::is_plain_column;
use crate::param::Param;
use std::collections::HashSet;
use tokio_postgres::types::ToSql;

/// Column tag that marks the identity field.
pub const IDENTITY_COLUMN: &str = "id";

/// How a field takes part in upserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// The surrogate key (`id` column). Zero means "not yet assigned".
    Identity,
    /// An `Option<T>` field; `None` means "not set".
    Optional,
    /// Any other field; always present.
    Required,
}

/// Decoding hint taken from the declared field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueHint {
    /// Decode from the column's own type.
    #[default]
    Plain,
    /// Declared `bool`: accept integer-encoded truth values.
    Bool,
}

/// Metadata for one declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: &'static str,
    key: &'static str,
    column: &'static str,
    kind: FieldKind,
    hint: ValueHint,
}

impl FieldDescriptor {
    /// Create a descriptor.
    ///
    /// - `name`: Rust field name
    /// - `key`: serialized key used when projecting rows into the record
    /// - `column`: SQL column name
    pub const fn new(
        name: &'static str,
        key: &'static str,
        column: &'static str,
        kind: FieldKind,
        hint: ValueHint,
    ) -> Self {
        Self {
            name,
            key,
            column,
            kind,
            hint,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn column(&self) -> &'static str {
        self.column
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn hint(&self) -> ValueHint {
        self.hint
    }

    pub fn is_identity(&self) -> bool {
        self.kind == FieldKind::Identity
    }
}

/// Ordered field metadata for a record type, with embedded records flattened in place.
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    record: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    pub fn new(record: &'static str, fields: Vec<FieldDescriptor>) -> Self {
        Self { record, fields }
    }

    /// Name of the record type.
    pub fn record_name(&self) -> &'static str {
        self.record
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of the identity field, if the record has one.
    pub fn identity(&self) -> Option<usize> {
        self.fields.iter().position(FieldDescriptor::is_identity)
    }

    /// Look up a field by SQL column name.
    ///
    /// Columns are written unquoted, so the server returns them folded to
    /// lower case; an exact match wins, then an ASCII case-insensitive one.
    pub fn field_by_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.column == column)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|f| f.column.eq_ignore_ascii_case(column))
            })
    }

    /// Check that the descriptor can back a decode or upsert call.
    ///
    /// Fails with [`OrmError::InvalidTarget`] when the record has no fields, a
    /// column name is not a bare identifier, or two fields share a column.
    pub fn validate(&self) -> OrmResult<()> {
        if self.fields.is_empty() {
            return Err(OrmError::invalid_target(format!(
                "{} declares no mapped fields",
                self.record
            )));
        }

        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if !is_plain_column(field.column) {
                return Err(OrmError::invalid_target(format!(
                    "{}.{}: '{}' is not a valid column name",
                    self.record, field.name, field.column
                )));
            }
            if !seen.insert(field.column.to_ascii_lowercase()) {
                return Err(OrmError::invalid_target(format!(
                    "{}: column '{}' is mapped more than once",
                    self.record, field.column
                )));
            }
        }
        Ok(())
    }
}

/// The value of one field, as bound into a statement.
#[derive(Debug, Clone)]
pub struct FieldValue {
    param: Param,
    present: bool,
}

impl FieldValue {
    /// Wrap a field value. `present` is false for unset optional fields and
    /// for an unassigned identity.
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T, present: bool) -> Self {
        Self {
            param: Param::new(value),
            present,
        }
    }

    pub fn param(&self) -> &Param {
        &self.param
    }

    pub fn is_present(&self) -> bool {
        self.present
    }
}

/// Integer surrogate keys following the zero/non-zero convention.
pub trait Identity {
    /// `true` when no identity has been assigned yet (zero or `None`).
    fn is_unassigned(&self) -> bool;

    /// The identity as `i64` (zero when unassigned).
    fn value(&self) -> i64;

    /// Store an identity reported by the database.
    fn assign(&mut self, id: i64) -> OrmResult<()>;
}

macro_rules! impl_identity {
    ($($ty:ty),*) => {
        $(
            impl Identity for $ty {
                fn is_unassigned(&self) -> bool {
                    *self == 0
                }

                fn value(&self) -> i64 {
                    i64::from(*self)
                }

                fn assign(&mut self, id: i64) -> OrmResult<()> {
                    *self = <$ty>::try_from(id).map_err(|_| {
                        OrmError::scan(
                            IDENTITY_COLUMN,
                            format!("generated id {id} does not fit in {}", stringify!($ty)),
                        )
                    })?;
                    Ok(())
                }
            }
        )*
    };
}

impl_identity!(i16, i32, i64);

impl<T: Identity + Default> Identity for Option<T> {
    fn is_unassigned(&self) -> bool {
        self.as_ref().is_none_or(Identity::is_unassigned)
    }

    fn value(&self) -> i64 {
        self.as_ref().map_or(0, Identity::value)
    }

    fn assign(&mut self, id: i64) -> OrmResult<()> {
        let mut inner = T::default();
        inner.assign(id)?;
        *self = Some(inner);
        Ok(())
    }
}

/// A record type whose fields can be enumerated, bound, diffed, and whose
/// identity can be written back.
///
/// Every accessor walks fields in [`Record::descriptor`] order, producing one
/// entry per descriptor (flattened records contribute their own entries in place).
pub trait Record {
    /// Field metadata, built once per type.
    fn descriptor() -> &'static RecordDescriptor;

    /// Push one [`FieldValue`] per descriptor.
    fn bind_fields(&self, out: &mut Vec<FieldValue>);

    /// Push one flag per descriptor: `true` when the field differs from `previous`.
    fn diff_fields(&self, previous: &Self, out: &mut Vec<bool>);

    /// Current identity value, or `None` if the record has no identity field.
    fn identity(&self) -> Option<i64>;

    /// Write a database-assigned identity. Returns `false` if the record has no identity field.
    fn set_identity(&mut self, id: i64) -> OrmResult<bool>;
}

/// Collect field values, checking them against the descriptor.
pub(crate) fn field_values<R: Record>(record: &R) -> OrmResult<Vec<FieldValue>> {
    let descriptor = R::descriptor();
    let mut values = Vec::with_capacity(descriptor.len());
    record.bind_fields(&mut values);
    if values.len() != descriptor.len() {
        return Err(OrmError::invalid_target(format!(
            "{} bound {} values for {} fields",
            descriptor.record_name(),
            values.len(),
            descriptor.len()
        )));
    }
    Ok(values)
}

/// Collect per-field change flags against a snapshot.
pub(crate) fn changed_fields<R: Record>(record: &R, previous: &R) -> OrmResult<Vec<bool>> {
    let descriptor = R::descriptor();
    let mut changed = Vec::with_capacity(descriptor.len());
    record.diff_fields(previous, &mut changed);
    if changed.len() != descriptor.len() {
        return Err(OrmError::invalid_target(format!(
            "{} compared {} values for {} fields",
            descriptor.record_name(),
            changed.len(),
            descriptor.len()
        )));
    }
    Ok(changed)
}

/// Count fields that currently carry a value (identity assigned, optionals set).
pub fn present_count<R: Record>(record: &R) -> usize {
    let mut values = Vec::with_capacity(R::descriptor().len());
    record.bind_fields(&mut values);
    values.iter().filter(|v| v.is_present()).count()
}
