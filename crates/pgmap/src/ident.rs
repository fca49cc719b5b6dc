//! SQL identifier validation for table and column names.
//!
//! Identifiers cannot be bound as parameters, so every name that ends up in a
//! generated statement passes through this module first.
//!
//! - Unquoted parts are validated against: `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow any characters except NUL and escape `"` as `""`
//!
//! # Example
//! ```ignore
//! use pgmap::Ident;
//!
//! let t = Ident::parse("public.users")?;
//! assert_eq!(t.to_sql(), "public.users");
//! # Ok::<(), pgmap::OrmError>(())
//! ```

use crate::error::{OrmError, OrmResult};

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    /// Unquoted identifier: must match `[A-Za-z_][A-Za-z0-9_$]*`.
    Unquoted(String),
    /// Quoted identifier: allows any characters except NUL.
    Quoted(String),
}

/// A table identifier, optionally schema-qualified (`schema.table`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

impl Ident {
    /// Parse an identifier string, supporting dotted and quoted forms.
    ///
    /// - Dotted: `schema.table`
    /// - Quoted: `"CamelCase"."UserTable"`
    /// - Mixed: `public."UserTable"`
    pub fn parse(s: &str) -> OrmResult<Self> {
        if s.is_empty() {
            return Err(OrmError::validation("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(OrmError::validation(
                "Identifier cannot contain NUL character",
            ));
        }

        let mut parts = Vec::new();
        let mut rest = s;
        loop {
            let (part, tail) = if let Some(quoted) = rest.strip_prefix('"') {
                parse_quoted(quoted)?
            } else {
                parse_unquoted(rest)?
            };
            parts.push(part);

            match tail.strip_prefix('.') {
                Some("") => return Err(OrmError::validation("Trailing '.' in identifier")),
                Some(next) => rest = next,
                None if tail.is_empty() => break,
                None => {
                    return Err(OrmError::validation(format!(
                        "Expected '.' between identifier parts, got '{tail}'"
                    )));
                }
            }
        }

        Ok(Self { parts })
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Unquoted(s) => out.push_str(s),
                IdentPart::Quoted(s) => {
                    out.push('"');
                    out.push_str(&s.replace('"', "\"\""));
                    out.push('"');
                }
            }
        }
    }
}

/// Parse the body of a quoted part (opening quote already consumed).
fn parse_quoted(s: &str) -> OrmResult<(IdentPart, &str)> {
    let mut name = String::new();
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '"' {
            name.push(c);
            continue;
        }
        if matches!(chars.peek(), Some((_, '"'))) {
            chars.next();
            name.push('"');
            continue;
        }
        if name.is_empty() {
            return Err(OrmError::validation("Empty quoted identifier"));
        }
        return Ok((IdentPart::Quoted(name), &s[i + 1..]));
    }
    Err(OrmError::validation("Unclosed quoted identifier"))
}

fn parse_unquoted(s: &str) -> OrmResult<(IdentPart, &str)> {
    let end = s.find(['.', '"']).unwrap_or(s.len());
    let name = &s[..end];
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(OrmError::validation("Empty identifier segment")),
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        Some(c) => {
            return Err(OrmError::validation(format!(
                "Invalid identifier start character: '{c}'"
            )));
        }
    }
    if let Some(c) = chars.find(|c| !(*c == '_' || *c == '$' || c.is_ascii_alphanumeric())) {
        return Err(OrmError::validation(format!(
            "Invalid character in identifier: '{c}'"
        )));
    }
    Ok((IdentPart::Unquoted(name.to_string()), &s[end..]))
}

/// Whether `s` is a bare column name (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// Column names are spliced into statements unquoted, so only this form is accepted.
pub(crate) fn is_plain_column(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
