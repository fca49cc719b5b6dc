//! End-to-end tests against a running PostgreSQL.
//!
//! Set `DATABASE_URL` (or put it in `.env`) to run these; they return early
//! otherwise. Every test works on session-local temporary tables.

use pgmap::{ColumnBinding, OrmError, Record, decode_many, decode_one, decoder, exec_report, upsert};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Record, Serialize, Deserialize)]
struct Member {
    id: i64,
    name: Option<String>,
    active: bool,
    note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Record, Serialize, Deserialize)]
struct Stamps {
    created_by: Option<String>,
    archived: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Record, Serialize, Deserialize)]
struct Document {
    id: i64,
    title: String,
    #[orm(flatten)]
    #[serde(flatten)]
    stamps: Stamps,
}

#[derive(Debug, Clone, Default, PartialEq, Record, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    id: i64,
    display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Record, Serialize, Deserialize)]
struct Ledger {
    id: i64,
    amount: Option<String>,
    scores: Vec<Option<i32>>,
    tags: Vec<String>,
    addr: Option<String>,
}

async fn try_connect() -> Option<tokio_postgres::Client> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").ok()?;
    let (client, connection) = tokio_postgres::connect(&url, tokio_postgres::NoTls)
        .await
        .ok()?;
    tokio::spawn(async move {
        let _ = connection.await;
    });
    Some(client)
}

async fn members_table(client: &tokio_postgres::Client) {
    client
        .batch_execute(
            "CREATE TEMP TABLE members (
                id BIGSERIAL PRIMARY KEY,
                name TEXT,
                active BOOLEAN NOT NULL DEFAULT false,
                note TEXT
            )",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn decode_one_coerces_bools_and_bytes() {
    let Some(client) = try_connect().await else {
        return;
    };

    let mut member = Member::default();
    decode_one(
        &client,
        "SELECT 7::int8 AS id, 'Ana'::text AS name, 1::int2 AS active, convert_to('hi', 'UTF8') AS note",
        &mut member,
        &[],
    )
    .await
    .unwrap();

    assert_eq!(
        member,
        Member {
            id: 7,
            name: Some("Ana".into()),
            active: true,
            note: Some("hi".into()),
        }
    );
}

#[tokio::test]
async fn decode_one_keeps_unselected_fields() {
    let Some(client) = try_connect().await else {
        return;
    };

    let mut member = Member {
        id: 1,
        name: Some("Ana".into()),
        active: true,
        note: Some("keep".into()),
    };
    decode_one(&client, "SELECT $1::text AS name", &mut member, &[&"Bea"])
        .await
        .unwrap();

    assert_eq!(member.name.as_deref(), Some("Bea"));
    assert_eq!(member.note.as_deref(), Some("keep"));
    assert!(member.active);
}

#[tokio::test]
async fn zero_rows() {
    let Some(client) = try_connect().await else {
        return;
    };

    let original = Member {
        id: 3,
        ..Member::default()
    };
    let mut member = original.clone();
    decode_one(&client, "SELECT 1::int8 AS id WHERE false", &mut member, &[])
        .await
        .unwrap();
    assert_eq!(member, original);

    let mut members = vec![original];
    decode_many(&client, "SELECT 1::int8 AS id WHERE false", &mut members, &[])
        .await
        .unwrap();
    assert!(members.is_empty());
}

#[tokio::test]
async fn decode_many_reads_every_row() {
    let Some(client) = try_connect().await else {
        return;
    };

    let sql = "SELECT * FROM (VALUES
            (1::int8, 'a'::text, 0::int4, NULL::text),
            (2::int8, 'b'::text, 5::int4, 'n'::text)
        ) AS t(id, name, active, note)
        ORDER BY id";

    let mut members: Vec<Member> = Vec::new();
    decode_many(&client, sql, &mut members, &[]).await.unwrap();

    assert_eq!(members.len(), 2);
    assert!(!members[0].active);
    assert!(members[1].active);
    assert_eq!(members[1].note.as_deref(), Some("n"));

    let mut positional: Vec<Member> = Vec::new();
    decoder(sql)
        .binding(ColumnBinding::ByPosition)
        .many(&client, &mut positional)
        .await
        .unwrap();
    assert_eq!(positional, members);
}

#[tokio::test]
async fn decode_errors_leave_target_untouched() {
    let Some(client) = try_connect().await else {
        return;
    };

    let original = Member {
        id: 9,
        ..Member::default()
    };

    let mut member = original.clone();
    let err = decode_one(&client, "SELECT FROM nowhere_at_all", &mut member, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Query(_)));
    assert_eq!(member, original);

    let err = decode_one(&client, "SELECT 'x'::text AS id", &mut member, &[])
        .await
        .unwrap_err();
    assert!(err.is_projection());
    assert_eq!(member, original);

    let mut members = vec![original.clone()];
    let err = decode_many(&client, "SELECT 'x'::text AS active", &mut members, &[])
        .await
        .unwrap_err();
    assert!(err.is_scan());
    assert_eq!(members, [original]);
}

#[tokio::test]
async fn upsert_back_fills_and_updates() {
    let Some(client) = try_connect().await else {
        return;
    };
    members_table(&client).await;

    let mut member = Member {
        id: 0,
        name: Some("Ana".into()),
        active: true,
        note: None,
    };
    let id = upsert(&client, "members", &mut member, None).await.unwrap();
    assert!(id > 0);
    assert_eq!(member.id, id);

    let snapshot = member.clone();
    member.note = Some("vip".into());
    member.name = None;
    let again = upsert(&client, "members", &mut member, Some(&snapshot))
        .await
        .unwrap();
    assert_eq!(again, id);

    let mut stored = Member::default();
    decode_one(
        &client,
        "SELECT id, name, active, note FROM members WHERE id = $1",
        &mut stored,
        &[&id],
    )
    .await
    .unwrap();
    assert_eq!(stored, member);
}

#[tokio::test]
async fn upsert_failures_are_execution_errors() {
    let Some(client) = try_connect().await else {
        return;
    };

    let mut member = Member {
        name: Some("Ana".into()),
        ..Member::default()
    };
    let err = upsert(&client, "no_such_table", &mut member, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Execution(_)));
    assert!(err.db_error().is_some());
    assert_eq!(member.id, 0);
}

#[tokio::test]
async fn exec_report_summarizes() {
    let Some(client) = try_connect().await else {
        return;
    };
    members_table(&client).await;

    let report = exec_report(
        &client,
        "INSERT INTO members (name) VALUES ($1) RETURNING id",
        "add member",
        &[&"Ana"],
    )
    .await;
    assert_eq!(report.message, "add member success");
    assert!(report.id > 0);

    let report = exec_report(&client, "DELETE FROM members", "clear", &[]).await;
    assert_eq!(report.message, "clear success");
    assert_eq!(report.id, 0);

    let report = exec_report(&client, "DELETE FROM no_such_table", "clear", &[]).await;
    assert_eq!(report.message, "clear failed");
    assert_eq!(report.id, 0);
}

#[tokio::test]
async fn decode_through_flattened_record() {
    let Some(client) = try_connect().await else {
        return;
    };

    let mut doc = Document::default();
    decode_one(
        &client,
        "SELECT 1::int8 AS id, 'Spec'::text AS title, 'ana'::text AS created_by, 1::int4 AS archived",
        &mut doc,
        &[],
    )
    .await
    .unwrap();

    assert_eq!(doc.stamps.created_by.as_deref(), Some("ana"));
    assert!(doc.stamps.archived);
    assert_eq!(doc.title, "Spec");
}

#[tokio::test]
async fn camel_case_columns_round_trip() {
    let Some(client) = try_connect().await else {
        return;
    };
    client
        .batch_execute("CREATE TEMP TABLE profiles (id BIGSERIAL PRIMARY KEY, displayName TEXT)")
        .await
        .unwrap();

    let mut profile = Profile {
        id: 0,
        display_name: Some("Ana".into()),
    };
    let id = upsert(&client, "profiles", &mut profile, None).await.unwrap();

    let mut stored = Profile::default();
    decode_one(&client, "SELECT * FROM profiles WHERE id = $1", &mut stored, &[&id])
        .await
        .unwrap();
    assert_eq!(stored, profile);
}

#[tokio::test]
async fn decode_numeric_arrays_and_inet() {
    let Some(client) = try_connect().await else {
        return;
    };

    let mut ledger = Ledger::default();
    decode_one(
        &client,
        "SELECT 1::int8 AS id,
                12.50::numeric AS amount,
                ARRAY[1, NULL, 3]::int4[] AS scores,
                ARRAY['a', 'b']::text[] AS tags,
                '10.0.0.1'::inet AS addr",
        &mut ledger,
        &[],
    )
    .await
    .unwrap();

    assert_eq!(
        ledger,
        Ledger {
            id: 1,
            amount: Some("12.50".into()),
            scores: vec![Some(1), None, Some(3)],
            tags: vec!["a".into(), "b".into()],
            addr: Some("10.0.0.1".into()),
        }
    );
}

#[tokio::test]
async fn unsupported_types_are_scan_errors() {
    let Some(client) = try_connect().await else {
        return;
    };

    let mut ledger = Ledger::default();
    let err = decode_one(&client, "SELECT '1 day'::interval AS amount", &mut ledger, &[])
        .await
        .unwrap_err();
    assert!(err.is_scan());
    assert!(err.to_string().contains("amount"));
}
