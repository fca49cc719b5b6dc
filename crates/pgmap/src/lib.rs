//! # pgmap
//!
//! Map arbitrary PostgreSQL result sets onto record types, and write records
//! back with diff-aware upserts.
//!
//! ## Features
//!
//! - **Row decoding**: any `SELECT` into a record or a `Vec` of records, matched by column name
//! - **Bool coercion**: integer-encoded truth values decode into `bool` fields
//! - **Upserts**: `INSERT ... ON CONFLICT (id) DO UPDATE` built from present or changed fields
//! - **Identity back-fill**: the generated `id` is written back into the record
//! - **Transaction-friendly**: pass a transaction anywhere a `GenericClient` is expected
//!
//! ## Example
//!
//! ```ignore
//! use pgmap::prelude::*;
//!
//! #[derive(Debug, Default, Record, serde::Serialize, serde::Deserialize)]
//! struct User {
//!     id: i64,
//!     name: Option<String>,
//!     email: Option<String>,
//!     active: bool,
//! }
//!
//! let mut user = User { name: Some("Ana".into()), ..Default::default() };
//! let id = upsert(&client, "users", &mut user, None).await?;
//!
//! let mut users: Vec<User> = Vec::new();
//! decode_many(&client, "SELECT id, name, email, active FROM users", &mut users, &[]).await?;
//! ```

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod ident;
pub mod param;
pub mod prelude;
pub mod record;
pub mod report;
pub mod sql;
pub mod upsert;

pub use client::GenericClient;
pub use config::DbConfig;
pub use decode::{ColumnBinding, Decoder, decode_many, decode_one, decoder};
pub use error::{OrmError, OrmResult};
pub use ident::Ident;
pub use param::{Param, ParamList};
pub use record::{
    FieldDescriptor, FieldKind, FieldValue, IDENTITY_COLUMN, Identity, Record, RecordDescriptor,
    ValueHint, present_count,
};
pub use report::{ExecReport, exec_report};
pub use sql::Sql;
pub use upsert::{UpsertStatement, build_upsert, upsert};

#[cfg(feature = "pool")]
pub mod database;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use database::Database;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_from_config, create_pool_with_config};

#[cfg(feature = "pool")]
pub use deadpool_postgres;

#[cfg(feature = "derive")]
pub use pgmap_derive::Record;
