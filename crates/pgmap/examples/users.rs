//! Walk-through of decoding, upserting and reporting against a `users` table.
//!
//! Reads `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD` and `DB_NAME`
//! (a `.env` file works too), then:
//!
//! ```text
//! cargo run -p pgmap --example users
//! ```

use pgmap::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Record, Serialize, Deserialize)]
struct User {
    id: i64,
    name: Option<String>,
    #[orm(column = "email_address")]
    email: Option<String>,
    active: bool,
}

#[tokio::main]
async fn main() -> OrmResult<()> {
    let db = Database::connect_env()?;

    let setup = db
        .exec_report(
            "CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                name TEXT,
                email_address TEXT,
                active BOOLEAN NOT NULL DEFAULT false
            )",
            "create users",
            &[],
        )
        .await;
    println!("{}", setup.message);

    // Insert: only present fields are written.
    let mut ana = User {
        name: Some("Ana".into()),
        ..User::default()
    };
    db.upsert("users", &mut ana, None).await?;
    println!("inserted {ana:?}");

    // Update: only fields that differ from the snapshot are written.
    let snapshot = ana.clone();
    ana.email = Some("ana@example.com".into());
    db.upsert("users", &mut ana, Some(&snapshot)).await?;

    // Integer-encoded flags decode into bool fields.
    let mut users: Vec<User> = Vec::new();
    db.decode_many(
        "SELECT id, name, email_address, active::int2 AS active FROM users ORDER BY id",
        &mut users,
        &[],
    )
    .await?;
    for user in &users {
        println!("{user:?}");
    }

    let report = db
        .exec_report(
            "UPDATE users SET active = true WHERE id = $1 RETURNING id",
            "activate",
            &[&ana.id],
        )
        .await;
    println!("{}", serde_json::to_string(&report)?);

    Ok(())
}
