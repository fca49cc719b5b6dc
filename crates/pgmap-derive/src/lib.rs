//! Derive macros for pgmap
//!
//! Provides `#[derive(Record)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod common;
mod record;
mod sql_ident;

/// Derive the `Record` trait for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use pgmap::Record;
///
/// #[derive(Default, Record, serde::Serialize, serde::Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct User {
///     id: i64,
///     display_name: Option<String>,
///     #[orm(column = "email_address")]
///     email: Option<String>,
///     active: bool,
///     #[serde(flatten)]
///     audit: Audit,
///     #[serde(skip)]
///     cached_score: u32,
/// }
/// ```
///
/// # Column names
///
/// A field's column is `#[orm(column = "...")]` if given, otherwise its serde
/// key (`#[serde(rename)]`, then the container's `rename_all`, then the field
/// name). The field whose column is `id` is the record's identity.
///
/// # Attributes
///
/// - `#[orm(column = "name")]` - Map field to a different column name
/// - `#[serde(flatten)]` - Inline the fields of a nested `Record`; rows decode
///   into it because serde reads its keys from the top level too
/// - `#[orm(flatten)]` - Accepted only next to `#[serde(flatten)]`, since a
///   nested serde object would not see the inlined columns
/// - `#[orm(skip)]` / `#[serde(skip)]` - Leave the field out of the mapping
#[proc_macro_derive(Record, attributes(orm))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
