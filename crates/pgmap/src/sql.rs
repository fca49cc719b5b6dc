//! Statement assembly with automatic `$n` numbering.
//!
//! `Sql` stores raw SQL pieces and parameters separately and renders
//! `$1, $2, ...` placeholders in the order values were bound. Binding the same
//! [`Param`] twice yields two consecutive indices over one shared value.

use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::param::Param;
use std::fmt::Write as _;
use tokio_postgres::types::ToSql;

#[derive(Debug, Clone)]
enum SqlPart {
    Raw(String),
    Param,
}

/// A parameter-safe statement builder.
#[must_use]
#[derive(Debug, Clone)]
pub struct Sql {
    parts: Vec<SqlPart>,
    params: Vec<Param>,
}

impl Sql {
    /// Create a new builder with an initial SQL fragment.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        Self {
            parts: vec![SqlPart::Raw(initial_sql.into())],
            params: Vec::new(),
        }
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }

        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Append a placeholder for an already wrapped parameter.
    pub fn push_param(&mut self, param: Param) -> &mut Self {
        self.parts.push(SqlPart::Param);
        self.params.push(param);
        self
    }

    /// Append a validated identifier.
    pub fn push_ident(&mut self, ident: &Ident) -> &mut Self {
        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => ident.write_sql(last),
            _ => {
                let mut s = String::new();
                ident.write_sql(&mut s);
                self.parts.push(SqlPart::Raw(s));
            }
        }
        self
    }

    /// Render SQL with `$1, $2, ...` placeholders.
    pub fn to_sql(&self) -> String {
        let cap = self
            .parts
            .iter()
            .map(|part| match part {
                SqlPart::Raw(s) => s.len(),
                SqlPart::Param => 4,
            })
            .sum();
        let mut out = String::with_capacity(cap);
        let mut idx = 0usize;
        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    // Writing into a String cannot fail.
                    let _ = write!(out, "${idx}");
                }
            }
        }
        out
    }

    /// Parameter refs compatible with `tokio-postgres`.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(Param::as_ref).collect()
    }

    /// Check that placeholders and bound values agree.
    pub fn validate(&self) -> OrmResult<()> {
        let placeholder_count = self
            .parts
            .iter()
            .filter(|p| matches!(p, SqlPart::Param))
            .count();

        if placeholder_count != self.params.len() {
            let params_len = self.params.len();
            return Err(OrmError::Validation(format!(
                "Sql: placeholders({placeholder_count}) != params({params_len})"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_placeholders_in_order() {
        let mut q = Sql::new("SELECT * FROM users WHERE a = ");
        q.push_param(Param::new(1))
            .push(" AND b = ")
            .push_param(Param::new("x"));

        assert_eq!(q.to_sql(), "SELECT * FROM users WHERE a = $1 AND b = $2");
        assert_eq!(q.params_ref().len(), 2);
        assert!(q.validate().is_ok());
    }

    #[test]
    fn shared_param_gets_two_indices() {
        let name = Param::new("Ana");
        let mut q = Sql::new("VALUES (");
        q.push_param(name.clone()).push(") SET name = ").push_param(name);

        assert_eq!(q.to_sql(), "VALUES ($1) SET name = $2");
        assert_eq!(q.params_ref().len(), 2);
    }

    #[test]
    fn push_ident_renders_quoted_parts() {
        let mut q = Sql::new("INSERT INTO ");
        q.push_ident(&Ident::parse(r#"app."Users""#).unwrap());
        q.push(" DEFAULT VALUES");
        assert_eq!(q.to_sql(), r#"INSERT INTO app."Users" DEFAULT VALUES"#);
    }

    #[test]
    fn empty_pushes_are_ignored() {
        let mut q = Sql::new("SELECT 1");
        q.push("");
        assert_eq!(q.to_sql(), "SELECT 1");
    }

    #[test]
    fn double_digit_placeholders() {
        let mut q = Sql::new("");
        for i in 0..12 {
            if i > 0 {
                q.push(", ");
            }
            q.push_param(Param::new(i));
        }
        assert!(q.to_sql().ends_with("$11, $12"));
    }
}
