use super::*;
use crate::record::{FieldDescriptor, FieldKind, Identity, ValueHint};
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, PartialEq)]
struct User {
    id: i64,
    name: Option<String>,
    email: Option<String>,
}

impl Record for User {
    fn descriptor() -> &'static RecordDescriptor {
        static DESCRIPTOR: OnceLock<RecordDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            RecordDescriptor::new(
                "User",
                vec![
                    FieldDescriptor::new("id", "id", "id", FieldKind::Identity, ValueHint::Plain),
                    FieldDescriptor::new("name", "name", "name", FieldKind::Optional, ValueHint::Plain),
                    FieldDescriptor::new(
                        "email",
                        "email",
                        "email",
                        FieldKind::Optional,
                        ValueHint::Plain,
                    ),
                ],
            )
        })
    }

    fn bind_fields(&self, out: &mut Vec<FieldValue>) {
        out.push(FieldValue::new(self.id, !self.id.is_unassigned()));
        out.push(FieldValue::new(self.name.clone(), self.name.is_some()));
        out.push(FieldValue::new(self.email.clone(), self.email.is_some()));
    }

    fn diff_fields(&self, previous: &Self, out: &mut Vec<bool>) {
        out.push(self.id != previous.id);
        out.push(self.name != previous.name);
        out.push(self.email != previous.email);
    }

    fn identity(&self) -> Option<i64> {
        Some(self.id)
    }

    fn set_identity(&mut self, id: i64) -> OrmResult<bool> {
        self.id.assign(id)?;
        Ok(true)
    }
}

/// A record with no `id` column.
#[derive(Debug, Clone, Default)]
struct Audit {
    action: String,
}

impl Record for Audit {
    fn descriptor() -> &'static RecordDescriptor {
        static DESCRIPTOR: OnceLock<RecordDescriptor> = OnceLock::new();
        DESCRIPTOR.get_or_init(|| {
            RecordDescriptor::new(
                "Audit",
                vec![FieldDescriptor::new(
                    "action",
                    "action",
                    "action",
                    FieldKind::Required,
                    ValueHint::Plain,
                )],
            )
        })
    }

    fn bind_fields(&self, out: &mut Vec<FieldValue>) {
        out.push(FieldValue::new(self.action.clone(), true));
    }

    fn diff_fields(&self, previous: &Self, out: &mut Vec<bool>) {
        out.push(self.action != previous.action);
    }

    fn identity(&self) -> Option<i64> {
        None
    }

    fn set_identity(&mut self, _id: i64) -> OrmResult<bool> {
        Ok(false)
    }
}

fn rendered_params(statement: &UpsertStatement) -> Vec<String> {
    statement
        .params_ref()
        .iter()
        .map(|p| format!("{p:?}"))
        .collect()
}

fn placeholder_indices(sql: &str) -> Vec<usize> {
    sql.split('$')
        .skip(1)
        .map(|rest| {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap()
        })
        .collect()
}

#[test]
fn new_record_inserts_present_fields_only() {
    let user = User {
        id: 0,
        name: Some("Ana".into()),
        email: None,
    };
    let statement = build_upsert("users", &user, None).unwrap();

    assert_eq!(
        statement.sql(),
        "INSERT INTO users (name) VALUES ($1) ON CONFLICT (id) DO UPDATE SET name = $2 RETURNING id"
    );
    assert_eq!(statement.columns(), ["name"]);
    assert_eq!(
        rendered_params(&statement),
        [r#"Some("Ana")"#, r#"Some("Ana")"#]
    );
}

#[test]
fn snapshot_limits_update_to_changed_fields() {
    let previous = User {
        id: 7,
        name: Some("Ana".into()),
        email: Some("x@y.com".into()),
    };
    let current = User {
        email: Some("z@y.com".into()),
        ..previous.clone()
    };
    let statement = build_upsert("users", &current, Some(&previous)).unwrap();

    assert_eq!(statement.columns(), ["id", "email"]);
    assert_eq!(
        statement.sql(),
        "INSERT INTO users (id, email) VALUES ($1, $2) \
         ON CONFLICT (id) DO UPDATE SET id = $3, email = $4 RETURNING id"
    );
    assert!(!statement.sql().contains("name"));
}

#[test]
fn update_placeholders_follow_insert_placeholders() {
    let user = User {
        id: 3,
        name: Some("Ana".into()),
        email: Some("a@b.c".into()),
    };
    let statement = build_upsert("users", &user, None).unwrap();
    let n = statement.len();

    assert_eq!(n, 3);
    assert_eq!(statement.params_ref().len(), 2 * n);
    assert_eq!(placeholder_indices(statement.sql()), (1..=2 * n).collect::<Vec<_>>());

    let params = rendered_params(&statement);
    assert_eq!(params[..n], params[n..]);
}

#[test]
fn building_twice_gives_the_same_statement() {
    let user = User {
        id: 0,
        name: Some("Ana".into()),
        email: Some("a@b.c".into()),
    };
    let first = build_upsert("users", &user, None).unwrap();
    let second = build_upsert("users", &user, None).unwrap();

    assert_eq!(first.sql(), second.sql());
    assert_eq!(rendered_params(&first), rendered_params(&second));
}

#[test]
fn changed_absent_field_is_written_as_null() {
    let previous = User {
        id: 4,
        name: Some("Ana".into()),
        email: Some("x@y.com".into()),
    };
    let current = User {
        email: None,
        ..previous.clone()
    };
    let statement = build_upsert("users", &current, Some(&previous)).unwrap();

    assert_eq!(statement.columns(), ["id", "email"]);
    assert_eq!(
        rendered_params(&statement),
        ["4", "None", "4", "None"]
    );
}

#[test]
fn unchanged_snapshot_only_carries_identity() {
    let user = User {
        id: 9,
        name: Some("Ana".into()),
        email: None,
    };
    let statement = build_upsert("users", &user, Some(&user)).unwrap();
    assert_eq!(statement.columns(), ["id"]);
}

#[test]
fn assigned_identity_is_included() {
    let user = User {
        id: 12,
        name: None,
        email: None,
    };
    let statement = build_upsert("users", &user, None).unwrap();

    assert_eq!(statement.columns(), ["id"]);
    assert_eq!(
        statement.sql(),
        "INSERT INTO users (id) VALUES ($1) ON CONFLICT (id) DO UPDATE SET id = $2 RETURNING id"
    );
}

#[test]
fn empty_record_uses_default_values() {
    let statement = build_upsert("users", &User::default(), None).unwrap();

    assert!(statement.is_empty());
    assert_eq!(statement.sql(), "INSERT INTO users DEFAULT VALUES RETURNING id");
    assert!(statement.params_ref().is_empty());
}

#[test]
fn record_without_identity_is_rejected() {
    let audit = Audit {
        action: "login".into(),
    };
    let err = build_upsert("audit", &audit, None).unwrap_err();
    assert!(err.is_tag_lookup());
    assert_eq!(
        err.to_string(),
        "Tag lookup error: Audit has no field tagged 'id'"
    );
}

#[test]
fn identity_check_comes_before_table_validation() {
    let err = build_upsert("not a table", &Audit::default(), None).unwrap_err();
    assert!(err.is_tag_lookup());
}

#[test]
fn invalid_table_name_is_rejected() {
    let user = User {
        name: Some("Ana".into()),
        ..User::default()
    };
    let err = build_upsert("users; DROP TABLE users", &user, None).unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[test]
fn schema_qualified_table() {
    let user = User {
        name: Some("Ana".into()),
        ..User::default()
    };
    let statement = build_upsert("app.users", &user, None).unwrap();
    assert!(statement.sql().starts_with("INSERT INTO app.users (name)"));
}
